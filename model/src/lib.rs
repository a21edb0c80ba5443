use core::str::FromStr;
use std::fmt;

use nutype::nutype;
use serde::de::Visitor;
use serde::{Deserialize, Serialize};

const FUNCTION_NAME_MAX_LEN: usize = 128;

/// Name of the build manifest inside the build context.
pub const DOCKERFILE: &str = "Dockerfile";

/// Name of a deployed function. Used as the image tag and as a single path
/// segment of the call route, hence the restricted alphabet.
#[nutype(
    validate(not_empty, predicate = is_valid_function_name),
    derive(
        Clone,
        Debug,
        PartialEq,
        Eq,
        Hash,
        PartialOrd,
        Ord,
        Display,
        AsRef,
        Serialize,
        Deserialize
    )
)]
pub struct FunctionName(String);

fn is_valid_function_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= FUNCTION_NAME_MAX_LEN
        && (first.is_ascii_lowercase() || first.is_ascii_digit())
        && chars.all(|c| {
            c.is_ascii_lowercase()
                || c.is_ascii_digit()
                || c == '.'
                || c == '_'
                || c == '-'
        })
}

/// Name of the file holding the function's source inside the build context.
#[nutype(
    sanitize(trim),
    validate(not_empty, predicate = is_valid_code_file_name),
    derive(Clone, Debug, PartialEq, Eq, Display, AsRef, Serialize, Deserialize)
)]
pub struct CodeFileName(String);

fn is_valid_code_file_name(name: &str) -> bool {
    !name.contains('/') && name != "." && name != ".." && name != DOCKERFILE
}

impl Default for CodeFileName {
    fn default() -> Self {
        CodeFileName::try_new("code.go")
            .expect("the default code file name is valid")
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PortError {
    #[error("Port must be an integer between 1 and 65535: {0}")]
    Invalid(String),
}

fn parse_port(value: &str) -> Result<u16, PortError> {
    match value.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(PortError::Invalid(value.to_string())),
        Ok(port) => Ok(port),
    }
}

/// Encapsulate the ports in custom structs to let the compiler differentiate
/// them. Ports travel as strings on the wire.
macro_rules! impl_port_encapsulation {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd)]
        pub struct $name {
            port: u16,
        }

        impl TryFrom<u16> for $name {
            type Error = PortError;

            fn try_from(port: u16) -> Result<Self, Self::Error> {
                if port == 0 {
                    return Err(PortError::Invalid(port.to_string()));
                }
                Ok($name { port })
            }
        }

        impl FromStr for $name {
            type Err = PortError;

            #[inline(always)]
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_port(s).map(|port| $name { port })
            }
        }

        impl fmt::Display for $name {
            #[inline(always)]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.port)
            }
        }

        impl From<$name> for u16 {
            #[inline(always)]
            fn from(port: $name) -> u16 { port.port }
        }

        impl Serialize for $name {
            #[inline(always)]
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.port.to_string().as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                struct MyVisitor;

                impl<'de> Visitor<'de> for MyVisitor {
                    type Value = $name;

                    fn expecting(
                        &self,
                        formatter: &mut fmt::Formatter,
                    ) -> fmt::Result {
                        formatter.write_str(
                            format!(
                                "a {}, i.e., a u16 as a string (\\\"8080\\\")",
                                stringify!($name)
                            )
                            .as_str(),
                        )
                    }

                    fn visit_str<E>(
                        self,
                        value: &str,
                    ) -> Result<Self::Value, E>
                    where
                        E: serde::de::Error,
                    {
                        value.parse().map_err(E::custom)
                    }

                    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
                    where
                        E: serde::de::Error,
                    {
                        let port = u16::try_from(value).map_err(|_| {
                            E::custom(PortError::Invalid(value.to_string()))
                        })?;
                        $name::try_from(port).map_err(E::custom)
                    }
                }

                deserializer.deserialize_any(MyVisitor)
            }
        }
    };
}

// Public port a deployed function asks to be exposed on
impl_port_encapsulation!(ExternalPort);
// Port this process listens on, announced to the registry
impl_port_encapsulation!(RunnerPort);
// Port every worker container serves on
impl_port_encapsulation!(WorkerPort);
// Port of the service name registry
impl_port_encapsulation!(RegistryPort);

/// Number of workers started per deployed function.
#[nutype(
    validate(greater = 0),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)
)]
pub struct PoolSize(usize);

pub mod domain;
pub mod view;
