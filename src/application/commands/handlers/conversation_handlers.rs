//! Conversation Stage Handlers - 角色回复与语音合成

use super::context::{require, StageContext};
use crate::application::commands::{GenerateSpeech, RespondToChat};
use crate::application::error::ApplicationError;
use crate::application::gate::StageOutcome;
use crate::application::ports::{
    generate_text, MessageRecord, MessageRole, SpeechRequest, SpeechResponse,
};
use crate::application::retry::retry_with_fixed_delay;
use crate::domain::prompts::{self, PersonaSheet, TranscriptLine};
use crate::domain::{remove_thinking, StageKind};

// ============================================================================
// RespondToChat
// ============================================================================

/// 一轮对话的结果
#[derive(Debug, Clone)]
pub struct ChatExchange {
    pub user_message: MessageRecord,
    pub reply: MessageRecord,
}

/// RespondToChat Handler
///
/// 用户消息和角色回复在同一个门内单元中以连续的 order 写入。
pub struct RespondToChatHandler {
    ctx: StageContext,
}

impl RespondToChatHandler {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(
        &self,
        command: RespondToChat,
    ) -> Result<StageOutcome<ChatExchange>, ApplicationError> {
        let ctx = &self.ctx;
        require(&command.message, "message is empty")?;

        let scenario = ctx.load_scenario(command.scenario_id).await?;
        let profile = ctx.load_profile(scenario.profile_id).await?;
        let scene_summary = scene_at(&scenario.scene_summaries, command.scene_index);

        let history = ctx.messages.find_by_scenario(scenario.id).await?;
        let transcript: Vec<TranscriptLine<'_>> = history
            .iter()
            .map(|m| TranscriptLine {
                from_user: m.role == MessageRole::User,
                content: &m.content,
            })
            .collect();

        let persona = PersonaSheet {
            name: &profile.name,
            background: &profile.background,
            personality: &profile.personality,
            interests: &profile.interests,
            physical_characteristics: &profile.physical_characteristics,
        };
        let messages = prompts::chat_reply(
            &persona,
            &scenario.summary,
            scene_summary,
            &transcript,
            command.message.trim(),
        );

        ctx.gate
            .run_stage(StageKind::ChatReply, || async {
                let llm = ctx.llm(&command.llm_model).await?;
                let reply = remove_thinking(&generate_text(llm.as_ref(), &messages).await?);
                if reply.is_empty() {
                    return Err(ApplicationError::ExternalServiceError(
                        "model returned an empty reply".to_string(),
                    ));
                }

                let order = ctx.messages.next_order(scenario.id).await?;
                let user_message = MessageRecord::new(
                    scenario.id,
                    order,
                    MessageRole::User,
                    command.message.trim().to_string(),
                );
                let reply = MessageRecord::new(scenario.id, order + 1, MessageRole::Character, reply);
                ctx.messages.save(&user_message).await?;
                ctx.messages.save(&reply).await?;

                tracing::info!(
                    scenario_id = %scenario.id,
                    order = reply.order,
                    reply_len = reply.content.len(),
                    "Chat reply generated"
                );
                Ok(ChatExchange {
                    user_message,
                    reply,
                })
            })
            .await
    }
}

/// 取指定场景，越界时取最后一个
fn scene_at(scenes: &[String], index: usize) -> &str {
    scenes
        .get(index)
        .or_else(|| scenes.last())
        .map(String::as_str)
        .unwrap_or("")
}

// ============================================================================
// GenerateSpeech
// ============================================================================

/// GenerateSpeech Handler
pub struct GenerateSpeechHandler {
    ctx: StageContext,
}

impl GenerateSpeechHandler {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(
        &self,
        command: GenerateSpeech,
    ) -> Result<StageOutcome<SpeechResponse>, ApplicationError> {
        let ctx = &self.ctx;
        require(&command.text, "speech text is empty")?;

        let model = match command.model {
            Some(model) => Some(model),
            None => ctx.gate.status().await?.tts_model,
        };
        let request = SpeechRequest {
            text: command.text,
            model,
            voice: command.voice,
        };

        ctx.gate
            .run_stage(StageKind::Speech, || async {
                let speech = retry_with_fixed_delay(
                    &ctx.stage_retry,
                    "speech synthesis",
                    ApplicationError::is_stage_retryable,
                    || {
                        let request = request.clone();
                        async move { ctx.speech.synthesize(request).await.map_err(ApplicationError::from) }
                    },
                )
                .await?;

                tracing::info!(
                    path = %speech.audio_path.display(),
                    size = speech.size_bytes,
                    "Speech generated"
                );
                Ok(speech)
            })
            .await
    }
}
