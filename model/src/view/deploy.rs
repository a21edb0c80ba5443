use serde::{Deserialize, Serialize};

use crate::domain::function::{DeployFunction, FunctionImage};
use crate::{CodeFileName, ExternalPort, FunctionName};

/// Body of `POST /serverless/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    pub name:           FunctionName,
    pub code:           String,
    pub docker_file:    String,
    pub port:           ExternalPort,
    #[serde(default)]
    pub code_file_name: CodeFileName,
}

impl From<DeployRequest> for DeployFunction {
    fn from(req: DeployRequest) -> Self {
        DeployFunction {
            image: FunctionImage {
                name:           req.name,
                code:           req.code,
                dockerfile:     req.docker_file,
                code_file_name: req.code_file_name,
            },
            port:  req.port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use yare::parameterized;

    #[test]
    fn test_parse_body_without_file_name() -> Result<()> {
        let req: DeployRequest = serde_json::from_str(
            r#"{
                "name": "echo",
                "code": "package main",
                "dockerFile": "FROM golang",
                "port": "8081"
            }"#,
        )?;
        let deploy = DeployFunction::from(req);

        assert_eq!(deploy.name().as_ref(), "echo");
        assert_eq!(deploy.image.dockerfile, "FROM golang");
        assert_eq!(deploy.image.code_file_name.as_ref(), "code.go");
        assert_eq!(u16::from(deploy.port), 8081);
        Ok(())
    }

    #[test]
    fn test_custom_code_file_name() -> Result<()> {
        let req: DeployRequest = serde_json::from_str(
            r#"{"name": "py", "code": "", "dockerFile": "FROM python",
                "port": 9000, "codeFileName": "main.py"}"#,
        )?;
        assert_eq!(req.code_file_name.as_ref(), "main.py");
        Ok(())
    }

    #[parameterized(
        missing_name = {r#"{"code": "", "dockerFile": "", "port": "1"}"#},
        missing_port = {r#"{"name": "a", "code": "", "dockerFile": ""}"#},
        port_not_a_number = {r#"{"name": "a", "code": "", "dockerFile": "", "port": "x"}"#},
        code_not_a_string = {r#"{"name": "a", "code": 1, "dockerFile": "", "port": "1"}"#},
        invalid_name = {r#"{"name": "A/B", "code": "", "dockerFile": "", "port": "1"}"#},
        not_an_object = {r#"["echo"]"#},
        truncated = {r#"{"name": "a", "#}
    )]
    fn test_malformed_body(body: &str) {
        assert!(serde_json::from_str::<DeployRequest>(body).is_err());
    }
}
