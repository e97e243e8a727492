//! Status Queries

/// 当前生成状态
#[derive(Debug, Clone)]
pub struct GetStatus;

/// 列出语言模型
#[derive(Debug, Clone)]
pub struct ListLlmModels;

/// 列出图像模型
#[derive(Debug, Clone)]
pub struct ListImageModels;
