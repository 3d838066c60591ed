/// Container label carrying the advertised service address
pub const LABEL_SERVICE_ADDRESS: &str = "land.strong.service.host";

/// Container label carrying the advertised service name
pub const LABEL_SERVICE_NAME: &str = "land.strong.service.name";

/// Content hash of the current service listing
pub const HASH_PATH: &str = "/v1/services/hash";
