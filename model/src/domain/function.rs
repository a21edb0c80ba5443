use crate::{CodeFileName, ExternalPort, FunctionName};

/// Build artifact submitted by a deploy call. Not retained once the image is
/// built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionImage {
    pub name:           FunctionName,
    pub code:           String,
    pub dockerfile:     String,
    pub code_file_name: CodeFileName,
}

/// Everything needed to run the deploy pipeline for one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployFunction {
    pub image: FunctionImage,
    pub port:  ExternalPort,
}

impl DeployFunction {
    pub fn name(&self) -> &FunctionName { &self.image.name }
}
