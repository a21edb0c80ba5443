/// Declare a constant holding the name of an environment variable, so the
/// name is spelled once.
#[macro_export]
macro_rules! env_var {
    ($name:ident) => {
        pub const $name: &'static str = stringify!($name);
    };
}

/// Load an environment variable into a validated `nutype` newtype.
///
/// Requires `anyhow::Context` to be in scope and must be used inside a
/// function returning an `anyhow::Result`.
#[macro_export]
macro_rules! env_load {
    ($type:ident, $name:ident) => {
        $type::try_new(
            std::env::var($name)
                .with_context(|| format!("Missing {} env var", $name))?,
        )
        .with_context(|| format!("{} was not formatted right", $name))?
    };
    ($type:ident, $name:ident, $type_raw:ident) => {
        $type::try_new(
            std::env::var($name)
                .with_context(|| format!("Missing {} env var", $name))?
                .parse::<$type_raw>()
                .with_context(|| {
                    format!(
                        "{} env var cannot be parsed in the correct type",
                        $name
                    )
                })?,
        )
        .with_context(|| format!("{} was not formatted right", $name))?
    };
    ($type:ident, $name:ident, $type_raw:ident, default = $default:expr) => {
        $type::try_new(match std::env::var($name) {
            Ok(raw) => raw.parse::<$type_raw>().with_context(|| {
                format!(
                    "{} env var cannot be parsed in the correct type",
                    $name
                )
            })?,
            Err(_) => $default,
        })
        .with_context(|| format!("{} was not formatted right", $name))?
    };
}
