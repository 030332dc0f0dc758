use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which input an operation was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Prerequisite {
    Rows,
    Photos,
    KeyColumn,
    Preview,
}

impl fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Prerequisite::Rows => "表格数据",
            Prerequisite::Photos => "照片",
            Prerequisite::KeyColumn => "文件名列",
            Prerequisite::Preview => "预览",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenameError {
    #[error("表格文件中没有数据")]
    EmptyDataset,
    #[error("表格文件解析失败: {0}")]
    ParseFailure(String),
    #[error("请先准备{0}")]
    PreconditionUnmet(Prerequisite),
    #[error("没有找到与占位符匹配的列: {0}")]
    UnresolvedPlaceholder(String),
    #[error("处理照片失败: {0}")]
    ProcessingFailed(String),
}

impl RenameError {
    pub fn code(&self) -> &'static str {
        match self {
            RenameError::EmptyDataset => "EmptyDataset",
            RenameError::ParseFailure(_) => "ParseFailure",
            RenameError::PreconditionUnmet(_) => "PreconditionUnmet",
            RenameError::UnresolvedPlaceholder(_) => "UnresolvedPlaceholder",
            RenameError::ProcessingFailed(_) => "ProcessingFailed",
        }
    }

    pub(crate) fn processing(err: anyhow::Error) -> Self {
        RenameError::ProcessingFailed(format!("{err:#}"))
    }
}

impl Serialize for RenameError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("RenameError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::{Prerequisite, RenameError};

    #[test]
    fn codes_are_stable() {
        assert_eq!(RenameError::EmptyDataset.code(), "EmptyDataset");
        assert_eq!(
            RenameError::PreconditionUnmet(Prerequisite::Photos).code(),
            "PreconditionUnmet"
        );
        assert_eq!(
            RenameError::ProcessingFailed("x".to_string()).code(),
            "ProcessingFailed"
        );
    }

    #[test]
    fn message_names_missing_input() {
        let err = RenameError::PreconditionUnmet(Prerequisite::KeyColumn);
        assert_eq!(err.to_string(), "请先准备文件名列");
    }

    #[test]
    fn serializes_code_and_message() {
        let json = serde_json::to_value(RenameError::UnresolvedPlaceholder("{未知列}".into()))
            .expect("serialize");
        assert_eq!(json["code"], "UnresolvedPlaceholder");
        assert_eq!(json["message"], "没有找到与占位符匹配的列: {未知列}");
    }
}
