#[derive(Clone, Debug)]
pub struct Configuration {
    /// `unix:///path`, `/path`, `tcp://host:port` or `http://host:port`.
    /// The local defaults are used when absent.
    pub address:      Option<String>,
    /// Network whose address is used to reach the containers.
    pub network:      String,
    pub timeout_secs: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            address:      None,
            network:      "bridge".to_string(),
            timeout_secs: 120,
        }
    }
}
