//! 各生成阶段的提示词

use serde::{Deserialize, Serialize};

/// 推理请求中的消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

/// 推理请求中的一条消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// 角色设定所需的字段
#[derive(Debug, Clone, Copy)]
pub struct PersonaSheet<'a> {
    pub name: &'a str,
    pub background: &'a str,
    pub personality: &'a str,
    pub interests: &'a str,
    pub physical_characteristics: &'a str,
}

/// 对话记录中的一行
#[derive(Debug, Clone, Copy)]
pub struct TranscriptLine<'a> {
    pub from_user: bool,
    pub content: &'a str,
}

const PROFILE_SYSTEM: &str = "You are a character profile generator. Develop a multi-dimensional \
persona for role-playing conversations. Provide 'background', 'personality', 'interests' and \
'physical_characteristics' that work together to form a unique individual. Be creative and concise: \
single words and evocative phrases are best. 'background' covers birthplace, education, occupation \
and a few formative life events (200 words or less). 'personality' covers temperament, desires, \
quirks and how they treat others (100 words or less). 'interests' is a short list (75 words or less). \
'physical_characteristics' is written as an image-generator prompt: comma separated fragments with \
an adjective and gender, build, skin tone, hair colour and style, facial features and eye colour \
(30 words or less). Infer a 'name' from the birthplace; use only pronouns outside the 'name' field. \
Reply with a JSON object with the string keys 'name', 'background', 'personality', 'interests' and \
'physical_characteristics'.";

const PROFILE_IMAGE_SYSTEM: &str = "You write prompts for an image generator: comma separated words \
and short phrases. Describe a portrait photograph of the character. Start with the physical \
characteristics, always keeping hair colour and eye colour. Add clothing, facial expression, pose, \
background and lighting. Leave out articles, conjunctions and anything that cannot be seen. Reply with \
a single line of 80 words or less.";

const SCENARIO_SYSTEM: &str = "You are a scenario generator. Develop an engaging role-playing \
scenario between the user and a character, structured like an episode made of scenes. Provide a \
short 'title', a 2 to 3 sentence 'summary', 6 to 7 single sentence 'scene_summaries' and an opening \
single sentence 'invitation' spoken by the character to the user. Address the user as 'you'; never \
invent a name for them. Draw on the character's background and interests and on any special \
requests. Reply with a JSON object whose 'title', 'summary' and 'invitation' are strings and whose \
'scene_summaries' is an array of strings.";

const SCENE_SYSTEM: &str = "You write prompts for an image generator: comma separated words and \
short phrases describing one visual scene of a character. Start with the character's physical \
characteristics, always keeping hair colour and eye colour. Infer location and activity from the \
scenario summary and the scene summary. Describe clothing consistent with the previous scene \
description unless the scene calls for a change, then expression, posture, background, lighting and \
relevant objects. Replace the character's name with an adjective and their gender. Include only what \
a photograph would capture. Reply with a single line of 100 words or less.";

/// 生成角色设定
pub fn profile(special_requests: &str) -> Vec<ChatMessage> {
    let mut request = String::from("Generate the profile of an original character.");
    if !special_requests.trim().is_empty() {
        request.push_str(&format!(" Special requests: {}.", special_requests.trim()));
    }
    vec![ChatMessage::system(PROFILE_SYSTEM), ChatMessage::user(request)]
}

/// 由外貌特征生成头像描述
pub fn profile_image_description(physical_characteristics: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(PROFILE_IMAGE_SYSTEM),
        ChatMessage::user(format!(
            "Physical characteristics: {}.\nWrite the portrait prompt.",
            physical_characteristics
        )),
    ]
}

/// 生成情景
pub fn scenario(persona: &PersonaSheet<'_>, special_requests: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SCENARIO_SYSTEM),
        ChatMessage::user(format!(
            "Character name: {}.\nCharacter background: {}.\nCharacter interests: {}.\nSpecial requests: {}.",
            persona.name, persona.background, persona.interests, special_requests
        )),
    ]
}

/// 生成单个场景的画面描述
pub fn scene_description(
    physical_characteristics: &str,
    scenario_summary: &str,
    scene_summary: &str,
    previous_description: &str,
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SCENE_SYSTEM),
        ChatMessage::user(format!(
            "Character physical characteristics: {}.\nScenario summary: {}.\nScene summary: {}.\nPrevious scene description: {}.",
            physical_characteristics, scenario_summary, scene_summary, previous_description
        )),
    ]
}

/// 角色回复
///
/// 系统消息携带人设、情景与当前场景；用户消息携带对话记录和新消息。
pub fn chat_reply(
    persona: &PersonaSheet<'_>,
    scenario_summary: &str,
    scene_summary: &str,
    transcript: &[TranscriptLine<'_>],
    message: &str,
) -> Vec<ChatMessage> {
    let system = format!(
        "You are {name}, a character in a role-playing conversation. Stay in character and reply in the \
first person with one or two short paragraphs. Never speak for the user.\n\
Background: {background}\nPersonality: {personality}\nInterests: {interests}\n\
Appearance: {appearance}\nScenario: {scenario}\nCurrent scene: {scene}",
        name = persona.name,
        background = persona.background,
        personality = persona.personality,
        interests = persona.interests,
        appearance = persona.physical_characteristics,
        scenario = scenario_summary,
        scene = scene_summary,
    );

    let mut user = String::new();
    if !transcript.is_empty() {
        user.push_str("Conversation so far:\n");
        for line in transcript {
            let speaker = if line.from_user { "User" } else { persona.name };
            user.push_str(&format!("{}: {}\n", speaker, line.content));
        }
        user.push('\n');
    }
    user.push_str(&format!("User: {}\n{}:", message, persona.name));

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}
