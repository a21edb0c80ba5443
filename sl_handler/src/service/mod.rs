pub(crate) mod deployment;
pub(crate) mod dispatcher;
pub(crate) mod provisioner;
pub(crate) mod registry_binder;
