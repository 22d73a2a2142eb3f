use clap::{Parser, Subcommand};

use crate::cli::*;

#[derive(Parser, Debug, Clone)]
pub struct GeminiOptions {
    /// Gemini API Key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: String,
    /// 图片生成模型
    #[arg(long, value_name = "MODEL", default_value = "gemini-2.5-flash-image")]
    pub gemini_model: String,
    /// 生成请求超时，单位为秒
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    pub gemini_timeout: u64,
}

#[derive(Parser, Debug, Clone)]
pub struct ClipOptions {
    /// CLIP 推理服务地址，不填则家具搜索功能不可用
    #[arg(long, env = "CLIP_URL", value_name = "URL")]
    pub clip_url: Option<String>,
    /// embedding 请求超时，单位为秒
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    pub clip_timeout: u64,
    /// 两次预热请求之间的最小间隔，单位为秒
    #[arg(long, value_name = "SECONDS", default_value_t = 20)]
    pub warm_interval: u64,
}

#[derive(Parser, Debug, Clone)]
pub struct QdrantOptions {
    /// Qdrant 服务地址
    #[arg(long, env = "QDRANT_URL", value_name = "URL")]
    pub qdrant_url: Option<String>,
    /// Qdrant API Key
    #[arg(long, env = "QDRANT_API_KEY", hide_env_values = true)]
    pub qdrant_api_key: Option<String>,
    /// 家具向量集合名称
    #[arg(long, env = "QDRANT_COLLECTION", value_name = "NAME", default_value = "furniture")]
    pub qdrant_collection: String,
    /// Qdrant 请求超时，单位为秒
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    pub qdrant_timeout: u64,
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// 返回的搜索结果数量
    #[arg(long, value_name = "COUNT", default_value_t = 4)]
    pub count: usize,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "restyle", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 对房间照片生成指定风格的重设计
    Redesign(RedesignCommand),
    /// 用图片在家具库中搜索相似商品
    Search(SearchCommand),
    /// 启动 HTTP 服务
    Server(ServerCommand),
}
