pub(crate) mod deployment_tracking;
pub(crate) mod registry;
pub(crate) mod worker_client;
pub(crate) mod worker_pool;
