//! 生成阶段端到端测试：假引擎 + 内存 SQLite

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{FakeLlm, Harness, SlowFirstLookup, UsageStore, FIRST_SAMPLE_SEED};
use storyforge::application::{
    ApplicationError, GenerateMainProfileImage, GenerateMainProfileImageHandler, GenerateProfile,
    GenerateProfileHandler, GenerateProfileImageDescription,
    GenerateProfileImageDescriptionHandler, GenerateSampleProfileImages,
    GenerateSampleProfileImagesHandler, GenerateScenario, GenerateScenarioHandler,
    GenerateScenarioImages, GenerateScenarioImagesHandler, GenerateSceneDescriptions,
    GenerateSceneDescriptionsHandler, GenerateSpeech, GenerateSpeechHandler, GateAcquisition,
    RespondToChat, RespondToChatHandler, StageOutcome, SurpriseMe, SurpriseMeHandler,
};
use storyforge::application::ports::{MessageRole, ProfileRecord, ScenarioRecord};
use storyforge::domain::image::RANDOM_SEED;
use storyforge::domain::IDLE;

fn generate_profile() -> GenerateProfile {
    GenerateProfile {
        llm_model: "fake-llm".to_string(),
        special_requests: "a sailor".to_string(),
    }
}

async fn described_profile(h: &Harness) -> ProfileRecord {
    let mut profile = ProfileRecord::new(
        "Mira".into(),
        "lighthouse".into(),
        "curious".into(),
        "sailing".into(),
        "auburn braid".into(),
    );
    profile.image_description = "portrait of a sailor with an auburn braid".to_string();
    h.ctx.profiles.save(&profile).await.unwrap();
    profile
}

#[tokio::test]
async fn test_surprise_me_end_to_end() {
    let h = Harness::build(FakeLlm::new(), UsageStore::Sqlite).await;
    let handler = SurpriseMeHandler::new(h.ctx.clone());

    let outcome = handler
        .handle(SurpriseMe {
            llm_model: "fake-llm".to_string(),
            image_model: "sdxl".to_string(),
            special_requests: String::new(),
        })
        .await
        .unwrap();
    let result = outcome.completed().expect("surprise should complete");

    // 主头像使用首张样图的种子，样图被替换
    let profile = result.profile;
    assert_eq!(profile.name, "Mira Kestrel");
    assert_eq!(profile.image_description, format!("Text number {}", 1));
    assert_eq!(profile.image_seed, Some(FIRST_SAMPLE_SEED));
    assert_eq!(profile.image_paths.len(), 1);
    assert!(profile.image_paths[0].starts_with(&format!("out/{}-", FIRST_SAMPLE_SEED)));
    assert_eq!(h.images.discarded().len(), 3);

    // 场景描述去掉推理旁路，每个场景一张图
    let scenario = result.scenario;
    assert_eq!(scenario.profile_id, profile.id);
    assert_eq!(scenario.scene_descriptions.len(), 2);
    assert!(scenario
        .scene_descriptions
        .iter()
        .all(|d| d.starts_with("Text number") && !d.contains("think")));
    assert_eq!(scenario.images.len(), 2);

    let requests = h.images.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[0].seed, RANDOM_SEED);
    assert_eq!(requests[0].images, 3);
    assert!(requests[1..].iter().all(|r| r.seed == FIRST_SAMPLE_SEED));
    assert_eq!(requests[2].prompt, scenario.scene_descriptions[0]);
    assert_eq!(requests[3].prompt, scenario.scene_descriptions[1]);

    let stored = h.ctx.load_scenario(scenario.id).await.unwrap();
    assert_eq!(stored.images, scenario.images);
    assert_eq!(h.status().await, IDLE);
}

#[tokio::test]
async fn test_seed_links_sample_to_main_image() {
    let h = Harness::build(FakeLlm::new(), UsageStore::Sqlite).await;
    let profile = ProfileRecord::new(
        "Mira".into(),
        "lighthouse".into(),
        "curious".into(),
        "sailing".into(),
        "red hair, green eyes".into(),
    );
    h.ctx.profiles.save(&profile).await.unwrap();

    GenerateProfileImageDescriptionHandler::new(h.ctx.clone())
        .handle(GenerateProfileImageDescription {
            profile_id: profile.id,
            llm_model: "fake-llm".to_string(),
        })
        .await
        .unwrap();

    let samples = GenerateSampleProfileImagesHandler::new(h.ctx.clone())
        .handle(GenerateSampleProfileImages {
            profile_id: profile.id,
            image_model: "sdxl".to_string(),
        })
        .await
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(samples.len(), 3);

    let main = GenerateMainProfileImageHandler::new(h.ctx.clone())
        .handle(GenerateMainProfileImage {
            profile_id: profile.id,
            image_model: "sdxl".to_string(),
            seed: None,
            source_image: Some(samples[0].clone()),
        })
        .await
        .unwrap()
        .completed()
        .unwrap();

    assert_eq!(main.image_seed, Some(FIRST_SAMPLE_SEED));
    assert_eq!(main.image_paths.len(), 1);
    assert!(!main.image_paths[0].is_empty());
    assert_eq!(h.images.requests()[1].seed, FIRST_SAMPLE_SEED);

    let stored = h.ctx.load_profile(profile.id).await.unwrap();
    assert_eq!(stored.image_paths, main.image_paths);
    assert_eq!(h.status().await, IDLE);
}

#[tokio::test]
async fn test_busy_stage_has_no_side_effects() {
    let h = Harness::build(FakeLlm::new(), UsageStore::Sqlite).await;
    assert_eq!(
        h.ctx.gate.try_acquire("Generating Scenario").await.unwrap(),
        GateAcquisition::Acquired
    );

    let outcome = GenerateProfileHandler::new(h.ctx.clone())
        .handle(generate_profile())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        StageOutcome::Busy {
            status: "Generating Scenario".to_string()
        }
    );
    assert_eq!(h.llm.calls(), 0);
    assert!(h.ctx.profiles.find_all().await.unwrap().is_empty());
    assert_eq!(h.status().await, "Generating Scenario");
}

#[tokio::test]
async fn test_concurrent_stages_one_wins() {
    let h = Harness::build(
        FakeLlm::new().with_delay(Duration::from_millis(50)),
        UsageStore::Memory,
    )
    .await;
    let first = GenerateProfileHandler::new(h.ctx.clone());
    let second = GenerateProfileHandler::new(h.ctx.clone());

    let (a, b) = tokio::join!(
        first.handle(generate_profile()),
        second.handle(generate_profile())
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    assert_eq!(outcomes.iter().filter(|o| o.is_busy()).count(), 1);
    assert_eq!(h.llm.calls(), 1);
    assert_eq!(h.ctx.profiles.find_all().await.unwrap().len(), 1);
    assert_eq!(h.status().await, IDLE);
}

#[tokio::test]
async fn test_failed_stage_leaves_error_label() {
    let h = Harness::new().await;
    h.llm.filtered.store(true, Ordering::SeqCst);

    let result = GenerateProfileHandler::new(h.ctx.clone())
        .handle(generate_profile())
        .await;
    assert!(matches!(result, Err(ApplicationError::ContentFiltered(_))));

    let status = h.ctx.gate.status().await.unwrap();
    assert!(status.is_error(), "status was {}", status.status);

    // 错误标签会挡住后续阶段，直到运维恢复
    h.llm.filtered.store(false, Ordering::SeqCst);
    let blocked = GenerateProfileHandler::new(h.ctx.clone())
        .handle(generate_profile())
        .await
        .unwrap();
    assert!(blocked.is_busy());

    let previous = h.ctx.gate.force_idle().await.unwrap();
    assert!(previous.starts_with("Error: "));
    assert_eq!(h.status().await, IDLE);

    let retried = GenerateProfileHandler::new(h.ctx.clone())
        .handle(generate_profile())
        .await
        .unwrap();
    assert!(retried.completed().is_some());
}

#[tokio::test]
async fn test_precondition_checked_before_acquire() {
    let h = Harness::new().await;
    let profile = ProfileRecord::new(
        "Mira".into(),
        "lighthouse".into(),
        "curious".into(),
        "sailing".into(),
        String::new(),
    );
    h.ctx.profiles.save(&profile).await.unwrap();

    let description = GenerateProfileImageDescriptionHandler::new(h.ctx.clone())
        .handle(GenerateProfileImageDescription {
            profile_id: profile.id,
            llm_model: "fake-llm".to_string(),
        })
        .await;
    assert!(matches!(description, Err(ApplicationError::PreconditionFailed(_))));

    let samples = GenerateSampleProfileImagesHandler::new(h.ctx.clone())
        .handle(GenerateSampleProfileImages {
            profile_id: profile.id,
            image_model: "sdxl".to_string(),
        })
        .await;
    assert!(matches!(samples, Err(ApplicationError::PreconditionFailed(_))));

    assert_eq!(h.llm.calls(), 0);
    assert!(h.images.requests().is_empty());
    assert_eq!(h.status().await, IDLE);
}

#[tokio::test]
async fn test_main_image_without_seed() {
    let h = Harness::new().await;
    let profile = described_profile(&h).await;

    let result = GenerateMainProfileImageHandler::new(h.ctx.clone())
        .handle(GenerateMainProfileImage {
            profile_id: profile.id,
            image_model: "sdxl".to_string(),
            seed: None,
            source_image: Some("out/portrait.png".to_string()),
        })
        .await;

    assert!(matches!(result, Err(ApplicationError::PreconditionSeedMissing(_))));
    assert!(h.images.requests().is_empty());
    assert_eq!(h.status().await, IDLE);
}

#[tokio::test]
async fn test_sample_images_append() {
    let h = Harness::new().await;
    let profile = described_profile(&h).await;
    let handler = GenerateSampleProfileImagesHandler::new(h.ctx.clone());
    let command = GenerateSampleProfileImages {
        profile_id: profile.id,
        image_model: "sdxl".to_string(),
    };

    handler.handle(command.clone()).await.unwrap();
    handler.handle(command).await.unwrap();

    let stored = h.ctx.load_profile(profile.id).await.unwrap();
    assert_eq!(stored.image_paths.len(), 6);
    assert!(h.images.discarded().is_empty());
}

#[tokio::test]
async fn test_scenario_images_skip_failed_scene() {
    let h = Harness::new().await;
    let mut profile = described_profile(&h).await;
    profile.image_seed = Some(77);
    h.ctx.profiles.save(&profile).await.unwrap();

    let scenario = GenerateScenarioHandler::new(h.ctx.clone())
        .handle(GenerateScenario {
            profile_id: profile.id,
            llm_model: "fake-llm".to_string(),
            special_requests: String::new(),
            chain_image_model: None,
        })
        .await
        .unwrap()
        .completed()
        .unwrap();
    assert!(scenario.scene_descriptions.is_empty());

    GenerateSceneDescriptionsHandler::new(h.ctx.clone())
        .handle(GenerateSceneDescriptions {
            scenario_id: scenario.id,
            llm_model: "fake-llm".to_string(),
        })
        .await
        .unwrap();

    h.images.fail_call(0);
    let illustrated = GenerateScenarioImagesHandler::new(h.ctx.clone())
        .handle(GenerateScenarioImages {
            scenario_id: scenario.id,
            image_model: "sdxl".to_string(),
        })
        .await
        .unwrap()
        .completed()
        .unwrap();

    assert_eq!(illustrated.images.len(), 1);
    assert!(illustrated.images[0].starts_with("out/77-1-"));
    assert_eq!(h.images.requests().len(), 2);
    assert_eq!(h.status().await, IDLE);
}

#[tokio::test]
async fn test_scenario_images_all_failed() {
    let h = Harness::new().await;
    let mut profile = described_profile(&h).await;
    profile.image_seed = Some(77);
    h.ctx.profiles.save(&profile).await.unwrap();

    let scenario = GenerateScenarioHandler::new(h.ctx.clone())
        .handle(GenerateScenario {
            profile_id: profile.id,
            llm_model: "fake-llm".to_string(),
            special_requests: String::new(),
            chain_image_model: None,
        })
        .await
        .unwrap()
        .completed()
        .unwrap();
    GenerateSceneDescriptionsHandler::new(h.ctx.clone())
        .handle(GenerateSceneDescriptions {
            scenario_id: scenario.id,
            llm_model: "fake-llm".to_string(),
        })
        .await
        .unwrap();

    h.images.fail_call(0);
    h.images.fail_call(1);
    let result = GenerateScenarioImagesHandler::new(h.ctx.clone())
        .handle(GenerateScenarioImages {
            scenario_id: scenario.id,
            image_model: "sdxl".to_string(),
        })
        .await;

    assert!(matches!(result, Err(ApplicationError::Protocol(_))));
    // 整批失败由最后一个单元写入错误标签
    let status = h.ctx.gate.status().await.unwrap();
    assert!(status.is_error(), "status was {}", status.status);
    assert!(status.status.contains("no images generated"));
    assert!(h
        .ctx
        .load_scenario(scenario.id)
        .await
        .unwrap()
        .images
        .is_empty());
}

#[tokio::test]
async fn test_chat_exchanges_keep_order() {
    let h = Harness::new().await;
    let profile = described_profile(&h).await;
    let scenario = GenerateScenarioHandler::new(h.ctx.clone())
        .handle(GenerateScenario {
            profile_id: profile.id,
            llm_model: "fake-llm".to_string(),
            special_requests: String::new(),
            chain_image_model: None,
        })
        .await
        .unwrap()
        .completed()
        .unwrap();

    let handler = RespondToChatHandler::new(h.ctx.clone());
    for message in ["Hello there", "  Where are we sailing?  "] {
        let exchange = handler
            .handle(RespondToChat {
                scenario_id: scenario.id,
                scene_index: 5,
                message: message.to_string(),
                llm_model: "fake-llm".to_string(),
            })
            .await
            .unwrap()
            .completed()
            .unwrap();
        assert_eq!(exchange.reply.order, exchange.user_message.order + 1);
        assert!(!exchange.reply.content.contains("<think>"));
    }

    let messages = h.ctx.messages.find_by_scenario(scenario.id).await.unwrap();
    let orders: Vec<i64> = messages.iter().map(|m| m.order).collect();
    assert_eq!(orders, [0, 1, 2, 3]);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[1].role, MessageRole::Character);
    assert_eq!(messages[2].content, "Where are we sailing?");

    let empty = handler
        .handle(RespondToChat {
            scenario_id: scenario.id,
            scene_index: 0,
            message: "   ".to_string(),
            llm_model: "fake-llm".to_string(),
        })
        .await;
    assert!(matches!(empty, Err(ApplicationError::PreconditionFailed(_))));
}

#[tokio::test]
async fn test_speech_uses_selected_model() {
    let h = Harness::new().await;
    h.ctx
        .gate
        .set_models("fake-llm", "sdxl", Some("orpheus"))
        .await
        .unwrap();

    let speech = GenerateSpeechHandler::new(h.ctx.clone())
        .handle(GenerateSpeech {
            text: "Ahoy".to_string(),
            model: None,
            voice: None,
        })
        .await
        .unwrap()
        .completed()
        .unwrap();

    assert_eq!(speech.size_bytes, 4);
    assert_eq!(h.speech.calls.load(Ordering::SeqCst), 1);

    let status = h.ctx.gate.status().await.unwrap();
    assert_eq!(status.status, IDLE);
    assert_eq!(status.tts_model.as_deref(), Some("orpheus"));
}

/// 已有场景描述、主头像种子为 77 的情景
async fn described_scenario(h: &Harness, summaries: usize) -> ScenarioRecord {
    let mut profile = described_profile(h).await;
    profile.image_seed = Some(77);
    h.ctx.profiles.save(&profile).await.unwrap();

    let mut scenario = ScenarioRecord::new(
        profile.id,
        "The Lantern Regatta".into(),
        "A night race between harbour towns.".into(),
        (0..summaries).map(|i| format!("Scene {}", i)).collect(),
        "Will you crew for me tonight?".into(),
    );
    scenario.scene_descriptions = (0..summaries).map(|i| format!("harbour at night {}", i)).collect();
    h.ctx.scenarios.save(&scenario).await.unwrap();
    scenario
}

#[tokio::test]
async fn test_stage_sees_writes_made_while_waiting() {
    let mut h = Harness::new().await;
    let profile = described_profile(&h).await;
    h.ctx.profiles = Arc::new(SlowFirstLookup::new(
        h.ctx.profiles.clone(),
        Duration::from_millis(200),
    ));

    let slow = GenerateSampleProfileImagesHandler::new(h.ctx.clone());
    let fast = GenerateSampleProfileImagesHandler::new(h.ctx.clone());
    let command = GenerateSampleProfileImages {
        profile_id: profile.id,
        image_model: "sdxl".to_string(),
    };

    // 慢的一方在占用门之前读取；快的一方在此期间完成整个阶段
    let (a, b) = tokio::join!(slow.handle(command.clone()), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        fast.handle(command.clone()).await
    });

    assert!(a.unwrap().completed().is_some());
    assert!(b.unwrap().completed().is_some());
    assert_eq!(h.images.requests().len(), 2);

    let stored = h.ctx.load_profile(profile.id).await.unwrap();
    assert_eq!(stored.image_paths.len(), 6);
    assert_eq!(h.status().await, IDLE);
}

#[tokio::test]
async fn test_scenario_images_rerun_replaces_previous_batch() {
    let h = Harness::new().await;
    let scenario = described_scenario(&h, 2).await;
    let handler = GenerateScenarioImagesHandler::new(h.ctx.clone());
    let command = GenerateScenarioImages {
        scenario_id: scenario.id,
        image_model: "sdxl".to_string(),
    };

    let first = handler.handle(command.clone()).await.unwrap().completed().unwrap();
    assert_eq!(first.images.len(), 2);

    let second = handler.handle(command).await.unwrap().completed().unwrap();
    assert_eq!(second.images.len(), 2);
    assert!(second.images[0].starts_with("out/77-2-"));
    assert!(second.images[1].starts_with("out/77-3-"));

    let stored = h.ctx.load_scenario(scenario.id).await.unwrap();
    assert_eq!(stored.images, second.images);
}

#[tokio::test]
async fn test_scene_descriptions_kept_when_interrupted() {
    let h = Harness::new().await.with_competitor(2, "Generating Speech");
    let mut scenario = described_scenario(&h, 3).await;
    scenario.scene_descriptions.clear();
    h.ctx.scenarios.save(&scenario).await.unwrap();

    let outcome = GenerateSceneDescriptionsHandler::new(h.ctx.clone())
        .handle(GenerateSceneDescriptions {
            scenario_id: scenario.id,
            llm_model: "fake-llm".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(
        outcome,
        StageOutcome::Busy {
            status: "Generating Speech".to_string()
        }
    );
    assert_eq!(h.llm.calls(), 2);

    let stored = h.ctx.load_scenario(scenario.id).await.unwrap();
    assert_eq!(stored.scene_descriptions, ["Text number 0", "Text number 1"]);
}

#[tokio::test]
async fn test_scenario_chain_reports_busy() {
    let h = Harness::new().await.with_competitor(1, "Generating Speech");
    let profile = described_profile(&h).await;

    let outcome = GenerateScenarioHandler::new(h.ctx.clone())
        .handle(GenerateScenario {
            profile_id: profile.id,
            llm_model: "fake-llm".to_string(),
            special_requests: String::new(),
            chain_image_model: Some("sdxl".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(
        outcome,
        StageOutcome::Busy {
            status: "Generating Speech".to_string()
        }
    );
    assert_eq!(h.llm.calls(), 1);
    assert!(h.images.requests().is_empty());
}

#[tokio::test]
async fn test_surprise_me_stops_when_chain_is_busy() {
    // 角色设定、头像描述、样图、主头像、情景各释放一次
    let h = Harness::new().await.with_competitor(5, "Generating Speech");

    let outcome = SurpriseMeHandler::new(h.ctx.clone())
        .handle(SurpriseMe {
            llm_model: "fake-llm".to_string(),
            image_model: "sdxl".to_string(),
            special_requests: String::new(),
        })
        .await
        .unwrap();

    assert!(outcome.is_busy());
    assert_eq!(h.images.requests().len(), 2);
    assert_eq!(h.status().await, "Generating Speech");
}
