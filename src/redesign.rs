use log::info;
use thiserror::Error;

use crate::gemini::ImageGenerator;

/// 清空房间的固定提示词：移除家具和人物，保留建筑结构、光照和透视
pub const EMPTY_ROOM_PROMPT: &str = "Remove all furniture, people, and objects from this room. \
    Show the room completely empty with bare walls and flooring. \
    Keep the exact architecture, size, window positions, lighting, and perspective unchanged. \
    Photorealistic.";

/// 按风格布置房间的提示词，additions 为用户附加的自由文本要求
pub fn design_prompt(style: &str, room_type: &str, additions: &str) -> String {
    let mut prompt = format!(
        "Furnish this empty room as a {style} {room_type}. \
         Keep the exact architecture, size, window positions, lighting, and perspective unchanged. \
         Add furniture, rugs, and decor matching the style. Photorealistic."
    );
    let additions = additions.trim();
    if !additions.is_empty() {
        prompt.push(' ');
        prompt.push_str(additions);
    }
    prompt
}

/// 局部修改的提示词：只应用指定改动，其余元素全部保持不变
pub fn refine_prompt(instruction: &str) -> String {
    format!(
        "Based on this image, apply the following change: {instruction}. \
         Maintain the exact perspective, lighting, architecture, and all other \
         furniture/decor that is not being changed. Photorealistic."
    )
}

/// 重设计模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedesignMode {
    /// 直接在原图上布置家具
    SingleStep,
    /// 先清空房间，再在空房间里布置家具
    EmptyThenGenerate,
}

impl RedesignMode {
    /// 解析表单里的 empty_then_generate 标记，接受 true/1/yes（不区分大小写）
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some(s) if matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes") => {
                Self::EmptyThenGenerate
            }
            _ => Self::SingleStep,
        }
    }
}

/// 两步流程中任何一步失败都会终止整个流程，错误指明失败的是哪一步
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RedesignError {
    #[error("清空房间失败")]
    EmptyStep,
    #[error("生成设计失败")]
    FurnishStep,
}

/// 重设计产物
///
/// before 是展示给用户的"改造前"对比图：单步模式下就是原图，
/// 两步模式下是清空后的房间
#[derive(Debug)]
pub struct Redesign {
    pub before: Vec<u8>,
    pub after: Vec<u8>,
}

/// 执行重设计流程
pub async fn redesign(
    generator: &dyn ImageGenerator,
    original: &[u8],
    style: &str,
    room_type: &str,
    additions: &str,
    mode: RedesignMode,
) -> Result<Redesign, RedesignError> {
    let prompt = design_prompt(style, room_type, additions);
    match mode {
        RedesignMode::SingleStep => {
            let after =
                generator.generate(original, &prompt).await.ok_or(RedesignError::FurnishStep)?;
            Ok(Redesign { before: original.to_vec(), after })
        }
        RedesignMode::EmptyThenGenerate => {
            info!("正在清空房间");
            let empty = generator
                .generate(original, EMPTY_ROOM_PROMPT)
                .await
                .ok_or(RedesignError::EmptyStep)?;
            info!("正在生成设计");
            let after =
                generator.generate(&empty, &prompt).await.ok_or(RedesignError::FurnishStep)?;
            Ok(Redesign { before: empty, after })
        }
    }
}

/// 在保持其余元素不变的前提下对现有设计做局部修改
pub async fn refine(
    generator: &dyn ImageGenerator,
    image: &[u8],
    instruction: &str,
) -> Option<Vec<u8>> {
    generator.generate(image, &refine_prompt(instruction)).await
}
