//! End-to-end session tests against a scripted model and real files

use pantry_agent::{ScriptedInput, Session, SessionExit, SessionOptions, SessionState, TurnOutcome};
use pantry_core::store::{HISTORY_KEY, PROFILE_KEY};
use pantry_core::{
    CompletionRequest, CompletionResponse, ErrorKind, FileBackend, GenerationOptions,
    HistoryStore, LlmProvider, MemoryBackend, Profile, ProfileStore, ProviderError,
    RecipeGenerator, StoreBackend,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const RECIPE: &str = r#"```json
{
  "title": "Chickpea Power Bowl",
  "description": "A hearty vegan bowl.",
  "ingredients": ["1 can chickpeas", "1 cup quinoa", "2 cups spinach"],
  "instructions": ["Cook the quinoa", "Roast the chickpeas", "Assemble the bowl"],
  "prep_time": "10 minutes",
  "cook_time": "20 minutes",
  "nutrition": {"calories": 520, "protein": 24, "estimated": true}
}
```"#;

#[derive(Clone, Copy)]
enum Reply {
    Text(&'static str),
    Hang,
}

/// Replays canned replies and records every outbound request
struct Recording {
    replies: Mutex<VecDeque<Reply>>,
    sent: Mutex<Vec<CompletionRequest>>,
}

impl Recording {
    fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn sent(&self) -> Vec<CompletionRequest> {
        self.sent.lock().unwrap().clone()
    }
}

impl LlmProvider for Recording {
    fn name(&self) -> &str {
        "recording"
    }

    fn models(&self) -> Vec<String> {
        vec!["test-model".into()]
    }

    fn default_model(&self) -> &str {
        "test-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.sent.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(text)) => Ok(CompletionResponse::text("test-model", text)),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(ProviderError::Other("no scripted reply left".into())),
        }
    }
}

fn options() -> SessionOptions {
    SessionOptions {
        generation: GenerationOptions::default().with_timeout(Duration::from_secs(5)),
        default_model: "test-model".into(),
        model_override: None,
    }
}

fn file_session(
    dir: &TempDir,
    lines: &[&str],
    replies: impl IntoIterator<Item = Reply>,
) -> Session<Recording, ScriptedInput, Vec<u8>> {
    colored::control::set_override(false);
    let backend = FileBackend::new(dir.path()).unwrap();
    Session::new(
        ProfileStore::new(backend.clone()),
        HistoryStore::new(backend),
        RecipeGenerator::new(Recording::new(replies)),
        ScriptedInput::new(lines.iter().copied()),
        Vec::new(),
        options(),
    )
}

fn memory_session(
    backend: Arc<dyn StoreBackend>,
    lines: &[&str],
    replies: impl IntoIterator<Item = Reply>,
) -> Session<Recording, ScriptedInput, Vec<u8>> {
    colored::control::set_override(false);
    Session::new(
        ProfileStore::with_backend(backend.clone()),
        HistoryStore::with_backend(backend),
        RecipeGenerator::new(Recording::new(replies)),
        ScriptedInput::new(lines.iter().copied()),
        Vec::new(),
        options(),
    )
}

fn output(session: &Session<Recording, ScriptedInput, Vec<u8>>) -> String {
    String::from_utf8_lossy(session.output()).into_owned()
}

fn user_prompt(request: &CompletionRequest) -> String {
    request.messages.last().map(|m| m.content.clone()).unwrap_or_default()
}

fn line_starting<'a>(text: &'a str, prefix: &str) -> &'a str {
    text.lines().find(|l| l.starts_with(prefix)).unwrap_or("")
}

#[tokio::test]
async fn test_first_run_end_to_end() {
    let dir = TempDir::new().unwrap();
    let mut session = file_session(
        &dir,
        &["vegan", "", "nuts", "", "high-protein", "I want something high protein for dinner"],
        [Reply::Text(RECIPE)],
    );

    assert_eq!(session.run().await.unwrap(), SessionExit::EndOfInput);

    let backend = FileBackend::new(dir.path()).unwrap();
    let profile = ProfileStore::new(backend.clone()).load().unwrap();
    assert!(profile.liked.contains("vegan"));
    assert!(profile.allergies.contains("nuts"));
    assert!(profile.fitness_goals.contains("high-protein"));

    let sent = session.generator().provider().sent();
    assert_eq!(sent.len(), 1);
    let prompt = user_prompt(&sent[0]);
    assert_eq!(line_starting(&prompt, "- Allergies"), "- Allergies (MUST NOT contain): nuts");
    let tags = line_starting(&prompt, "- Tags:");
    assert!(tags.contains("high-protein"));
    assert!(tags.contains("dinner"));
    assert_eq!(sent[0].model.as_deref(), Some("test-model"));

    let text = output(&session);
    assert!(text.contains("Profile saved!"));
    assert!(text.contains("Chickpea Power Bowl"));
    assert!(text.contains("1 can chickpeas"));

    let history = HistoryStore::new(backend);
    let entries = history.list(None).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].outcome.is_success());
    assert_eq!(entries[0].request.utterance(), "I want something high protein for dinner");
}

#[tokio::test]
async fn test_allergen_in_utterance_still_excluded() {
    let dir = TempDir::new().unwrap();
    let backend = FileBackend::new(dir.path()).unwrap();
    ProfileStore::new(backend)
        .save(&Profile::builder().allergies(["nuts"]).build())
        .unwrap();

    let mut session = file_session(&dir, &["a dessert with nuts", "q"], [Reply::Text(RECIPE)]);
    assert_eq!(session.run().await.unwrap(), SessionExit::Quit);

    let sent = session.generator().provider().sent();
    assert_eq!(sent.len(), 1);
    let prompt = user_prompt(&sent[0]);
    assert_eq!(line_starting(&prompt, "- Allergies"), "- Allergies (MUST NOT contain): nuts");
    assert!(prompt.contains("substitute a safe alternative"));
    assert!(output(&session).contains("as an allergy"));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_transient() {
    let dir = TempDir::new().unwrap();
    let backend = FileBackend::new(dir.path()).unwrap();
    ProfileStore::new(backend.clone())
        .save(&Profile::builder().liked(["pasta"]).build())
        .unwrap();

    let mut session = file_session(&dir, &["pasta for lunch", "quit"], [Reply::Hang]);
    assert_eq!(session.run().await.unwrap(), SessionExit::Quit);
    assert_eq!(session.state(), SessionState::Ready);

    assert!(output(&session).contains("Couldn't reach the recipe service"));
    assert_eq!(session.generator().provider().sent().len(), 1);
    assert!(HistoryStore::new(backend).is_empty().unwrap());
}

#[tokio::test]
async fn test_malformed_reply_is_recorded_as_failure() {
    let dir = TempDir::new().unwrap();
    let backend = FileBackend::new(dir.path()).unwrap();
    ProfileStore::new(backend.clone())
        .save(&Profile::builder().build())
        .unwrap();

    let mut session = file_session(&dir, &[], [Reply::Text("Sorry, I can't help with that.")]);
    session.start().await.unwrap();
    match session.handle_request("tomato soup").await.unwrap() {
        TurnOutcome::Failed(e) => assert_eq!(e.kind(), ErrorKind::MalformedResponse),
        other => panic!("unexpected outcome: {:?}", other),
    }

    let entries = HistoryStore::new(backend).list(None).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].outcome.is_success());
}

#[tokio::test]
async fn test_rejected_request_never_calls_model() {
    let dir = TempDir::new().unwrap();
    let backend = FileBackend::new(dir.path()).unwrap();
    ProfileStore::new(backend.clone())
        .save(&Profile::builder().build())
        .unwrap();

    let mut session = file_session(&dir, &["I want something", "  ...  ", "quit"], []);
    assert_eq!(session.run().await.unwrap(), SessionExit::Quit);
    assert!(session.generator().provider().sent().is_empty());
    assert!(output(&session).contains("couldn't find a dish or ingredient"));
    assert!(HistoryStore::new(backend).is_empty().unwrap());
}

#[tokio::test]
async fn test_corrupt_profile_is_quarantined_and_replaced() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("profile.json"), "{ not json").unwrap();

    let mut session = file_session(&dir, &["tacos", "", "", "", "", "quit"], []);
    assert_eq!(session.run().await.unwrap(), SessionExit::Quit);

    assert!(output(&session).contains("could not be read"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("profile.json.corrupt")).unwrap(),
        "{ not json"
    );
    let profile = ProfileStore::new(FileBackend::new(dir.path()).unwrap()).load().unwrap();
    assert!(profile.liked.contains("tacos"));
}

#[tokio::test]
async fn test_end_of_input_during_onboarding_saves_nothing() {
    let dir = TempDir::new().unwrap();
    let mut session = file_session(&dir, &["vegan", "olives"], []);
    assert_eq!(session.run().await.unwrap(), SessionExit::EndOfInput);
    assert_eq!(session.state(), SessionState::Onboarding);
    assert!(!dir.path().join("profile.json").exists());
}

#[tokio::test]
async fn test_unreadable_profile_fails_startup() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("profile.json")).unwrap();

    let mut session = file_session(&dir, &["vegan", "", "", "", ""], []);
    let err = session.start().await.unwrap_err();
    assert!(err.kind().is_storage(), "{}", err);
    assert_eq!(session.state(), SessionState::Onboarding);
    assert!(session.profile().is_none());
    assert!(!output(&session).contains("Profile saved!"));
    assert!(dir.path().join("profile.json").is_dir());
}

#[tokio::test]
async fn test_absurd_duration_in_reply_is_dropped() {
    const SLOW: &str = r#"{
        "title": "Slow Beans",
        "ingredients": ["2 cups beans"],
        "instructions": ["Simmer"],
        "prep_time": 5000000000,
        "cook_time": 5
    }"#;
    let dir = TempDir::new().unwrap();
    let backend = FileBackend::new(dir.path()).unwrap();
    ProfileStore::new(backend.clone())
        .save(&Profile::builder().build())
        .unwrap();

    let mut session = file_session(&dir, &["bean stew", "quit"], [Reply::Text(SLOW)]);
    assert_eq!(session.run().await.unwrap(), SessionExit::Quit);

    let text = output(&session);
    assert!(text.contains("Slow Beans"));
    assert!(text.contains("Cook: 5 min, Total: 5 min"));
    assert!(!text.contains("Prep:"));
    assert_eq!(HistoryStore::new(backend).len().unwrap(), 1);
}

#[tokio::test]
async fn test_non_food_request_never_calls_model() {
    let dir = TempDir::new().unwrap();
    let backend = FileBackend::new(dir.path()).unwrap();
    ProfileStore::new(backend.clone())
        .save(&Profile::builder().liked(["vegan"]).build())
        .unwrap();

    let mut session = file_session(&dir, &["tell me a joke about the weather", "quit"], []);
    assert_eq!(session.run().await.unwrap(), SessionExit::Quit);
    assert!(session.generator().provider().sent().is_empty());
    assert!(output(&session).contains("couldn't find a dish or ingredient"));
    assert!(HistoryStore::new(backend).is_empty().unwrap());
}

#[tokio::test]
async fn test_corrupt_history_points_to_history_clear() {
    let dir = TempDir::new().unwrap();
    let backend = FileBackend::new(dir.path()).unwrap();
    ProfileStore::new(backend.clone())
        .save(&Profile::builder().build())
        .unwrap();
    std::fs::write(dir.path().join("history.json"), "{ nope").unwrap();

    let mut session = file_session(
        &dir,
        &["soup", "history clear", "y", "salad", "quit"],
        [Reply::Text(RECIPE), Reply::Text(RECIPE)],
    );
    assert_eq!(session.run().await.unwrap(), SessionExit::Quit);

    let text = output(&session);
    assert_eq!(text.matches("Could not save your data").count(), 1);
    assert!(text.contains("Type 'history clear'"));
    assert_eq!(HistoryStore::new(backend).len().unwrap(), 1);
}

/// Memory backend whose writes under one key fail a set number of times
struct FailingWrites {
    inner: MemoryBackend,
    key: &'static str,
    failures: Mutex<u32>,
}

impl FailingWrites {
    fn new(key: &'static str, failures: u32) -> Self {
        Self {
            inner: MemoryBackend::new(),
            key,
            failures: Mutex::new(failures),
        }
    }
}

impl StoreBackend for FailingWrites {
    fn read(&self, key: &str) -> pantry_core::Result<Option<String>> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, contents: &str) -> pantry_core::Result<()> {
        if key == self.key {
            let mut left = self.failures.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(pantry_core::Error::storage_failed("disk full"));
            }
        }
        self.inner.write(key, contents)
    }

    fn remove(&self, key: &str) -> pantry_core::Result<()> {
        self.inner.remove(key)
    }

    fn quarantine(&self, key: &str) -> pantry_core::Result<Option<String>> {
        self.inner.quarantine(key)
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

#[tokio::test]
async fn test_profile_save_failure_during_onboarding() {
    let backend: Arc<dyn StoreBackend> = Arc::new(FailingWrites::new(PROFILE_KEY, 1));
    let mut session = memory_session(backend.clone(), &["vegan", "", "", "", "", "quit"], []);

    assert_eq!(session.run().await.unwrap(), SessionExit::Quit);
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.profile().unwrap().liked.contains("vegan"));

    let text = output(&session);
    assert!(text.contains("Could not save your data"));
    assert!(text.contains("was not saved"));
    assert!(!text.contains("Profile saved!"));
    assert!(!ProfileStore::with_backend(backend).exists().unwrap());
}

#[tokio::test]
async fn test_recipe_shown_when_one_history_write_fails() {
    let backend: Arc<dyn StoreBackend> = Arc::new(FailingWrites::new(HISTORY_KEY, 1));
    ProfileStore::with_backend(backend.clone())
        .save(&Profile::builder().build())
        .unwrap();

    let mut session = memory_session(
        backend.clone(),
        &["soup", "salad", "quit"],
        [Reply::Text(RECIPE), Reply::Text(RECIPE)],
    );
    assert_eq!(session.run().await.unwrap(), SessionExit::Quit);

    let text = output(&session);
    assert_eq!(text.matches("Chickpea Power Bowl").count(), 2);
    assert_eq!(text.matches("Could not save your data").count(), 1);
    assert_eq!(HistoryStore::with_backend(backend).len().unwrap(), 1);
}

#[tokio::test]
async fn test_repeated_storage_failures_are_fatal() {
    let backend: Arc<dyn StoreBackend> = Arc::new(FailingWrites::new(HISTORY_KEY, u32::MAX));
    ProfileStore::with_backend(backend.clone())
        .save(&Profile::builder().build())
        .unwrap();

    let mut session = memory_session(
        backend,
        &["soup", "salad", "stew", "curry"],
        [Reply::Text(RECIPE); 4],
    );

    let err = session.run().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageFailed);
    assert_eq!(session.generator().provider().sent().len(), 3);
    let text = output(&session);
    assert_eq!(text.matches("Could not save your data").count(), 2);
    assert_eq!(text.matches("Chickpea Power Bowl").count(), 3);
}
