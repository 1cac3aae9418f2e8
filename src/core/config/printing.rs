use crate::core::config::data::Config;

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.default_server {
            Some(server) => println!("  default-server: {server}"),
            None => println!("  default-server: (unset)"),
        }
        match self.use_keyring() {
            true => println!("  use-keyring: on"),
            false => println!("  use-keyring: off"),
        }
        println!(
            "  connect-timeout: {}s",
            self.connect_timeout().as_secs()
        );
        println!(
            "  attempt-timeout: {}s",
            self.attempt_timeout().as_secs()
        );
        println!("  probe-timeout: {}s", self.probe_timeout().as_secs());
        let backoff = self.backoff();
        println!(
            "  retry-delay: {}ms initial, {}ms max",
            backoff.initial.as_millis(),
            backoff.max.as_millis()
        );
        println!("  max-recent-servers: {}", self.max_recent_servers());
        println!("  max-executions: {}", self.max_executions());
        println!("  directory-url: {}", self.directory_url());
        println!(
            "  directory-cache: {}h",
            self.directory_cache_max_age().as_secs() / 3600
        );
    }
}
