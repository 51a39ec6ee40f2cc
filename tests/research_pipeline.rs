//! End-to-end tests for the LuxMap conversation and research pipeline,
//! driven by a scripted model instead of Ollama.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use luxmap_agent::{
    build_research_pipeline, Config, GroundingChunk, GroundingMetadata, GroundingSupport,
    InteractivePlanner, LanguageModel, ModelRequest, ModelTurn, PlannerReply, Result, Segment,
    SessionState, Stage, WebSource,
};

/// Recognises each agent by a phrase from its instructions and answers
/// with canned output.
struct ScriptedModel {
    /// Verdicts handed out by the evaluator, in order; the last one repeats
    verdicts: Vec<&'static str>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl ScriptedModel {
    fn new(verdicts: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            verdicts,
            calls: Mutex::new(HashMap::new()),
        })
    }

    async fn calls(&self, role: &str) -> usize {
        self.calls.lock().await.get(role).copied().unwrap_or(0)
    }
}

fn web(uri: &str, title: &str, domain: &str) -> GroundingChunk {
    GroundingChunk {
        web: Some(WebSource {
            uri: uri.to_string(),
            title: title.to_string(),
            domain: domain.to_string(),
        }),
    }
}

fn grounded(text: &str, chunks: Vec<GroundingChunk>, supports: Vec<GroundingSupport>) -> ModelTurn {
    ModelTurn {
        text: text.to_string(),
        grounding: Some(GroundingMetadata {
            grounding_chunks: chunks,
            grounding_supports: supports,
        }),
    }
}

const FAIL: &str = r#"{"grade": "fail", "comment": "No cafes", "follow_up_queries": [{"search_query": "best cafes Dubai"}]}"#;
const PASS: &str = r#"```json
{"grade": "pass", "comment": "Thorough coverage"}
```"#;

const REPORT: &str = concat!(
    "# Where to stay\n",
    "The Burj Al Arab offers butler service<cite source=\"src-1\" />. ",
    "Try Arabica cafe<cite source='src-3' /> , and skip <cite source=\"src-99\" />."
);

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: ModelRequest) -> Result<ModelTurn> {
        let role = if request.preamble.contains("You decide the next step") {
            "coordinator"
        } else if request.preamble.contains("Create a high-level TRAVEL PLAN") {
            "plan_generator"
        } else if request.preamble.contains("travel report architect") {
            "section_planner"
        } else if request.preamble.contains("research and synthesis agent") {
            "section_researcher"
        } else if request.preamble.contains("quality assurance analyst") {
            "research_evaluator"
        } else if request.preamble.contains("refinement pass") {
            "enhanced_search_executor"
        } else {
            "report_composer"
        };

        let n = {
            let mut calls = self.calls.lock().await;
            let count = calls.entry(role).or_insert(0);
            *count += 1;
            *count
        };

        let turn = match role {
            "coordinator" => ModelTurn::text("EXECUTE"),
            "plan_generator" => ModelTurn::text("- [RESEARCH] Identify luxury hotels in Dubai"),
            "section_planner" => ModelTurn::text("# Where to stay\n# Where to eat"),
            "section_researcher" => grounded(
                "Hotels: Burj Al Arab, Atlantis.",
                vec![
                    web("https://a.com/burj", "Burj Guide", "a.com"),
                    GroundingChunk { web: None },
                    web("https://b.com/atlantis", "b.com", "b.com"),
                ],
                vec![GroundingSupport {
                    segment: Some(Segment {
                        text: "Burj Al Arab offers butler service".to_string(),
                    }),
                    grounding_chunk_indices: vec![0, 1, 2],
                    confidence_scores: vec![0.9],
                }],
            ),
            "research_evaluator" => {
                let idx = (n - 1).min(self.verdicts.len() - 1);
                ModelTurn::text(self.verdicts[idx])
            }
            "enhanced_search_executor" => grounded(
                "Hotels: Burj Al Arab, Atlantis. Cafes: Arabica.",
                vec![
                    web("https://c.com/cafes", "Cafe List", "c.com"),
                    web("https://a.com/burj", "Burj Guide", "a.com"),
                ],
                vec![GroundingSupport {
                    segment: Some(Segment {
                        text: "Arabica is a favourite".to_string(),
                    }),
                    grounding_chunk_indices: vec![0],
                    confidence_scores: vec![0.75],
                }],
            ),
            _ => ModelTurn::text(REPORT),
        };
        Ok(turn)
    }
}

#[tokio::test]
async fn test_plan_then_approve_produces_cited_report() {
    let model = ScriptedModel::new(vec![FAIL, PASS]);
    let planner = InteractivePlanner::new(&Config::default(), model.clone());
    let mut session = SessionState::new();

    let first = planner
        .handle(&mut session, "Four days of luxury in Dubai")
        .await
        .unwrap();
    assert_eq!(
        first,
        PlannerReply::Plan("- [RESEARCH] Identify luxury hotels in Dubai".to_string())
    );
    // No plan existed, so the coordinator was not consulted
    assert_eq!(model.calls("coordinator").await, 0);

    let second = planner
        .handle(&mut session, "Looks good, run it")
        .await
        .unwrap();

    let expected = "# Where to stay\n\
        The Burj Al Arab offers butler service [Burj Guide](https://a.com/burj). \
        Try Arabica cafe [Cafe List](https://c.com/cafes), and skip.";
    assert_eq!(second, PlannerReply::Report(expected.to_string()));
    assert_eq!(session.final_report_with_citations(), Some(expected));

    // fail -> refine -> pass: the loop exits before a second refinement
    assert_eq!(model.calls("research_evaluator").await, 2);
    assert_eq!(model.calls("enhanced_search_executor").await, 1);
    assert!(session
        .events()
        .iter()
        .any(|e| e.author == "escalation_checker" && e.escalate));

    let table = session.url_to_short_id();
    assert_eq!(table.len(), 3);
    assert_eq!(table["https://a.com/burj"], "src-1");
    assert_eq!(table["https://b.com/atlantis"], "src-2");
    assert_eq!(table["https://c.com/cafes"], "src-3");

    let burj = &session.sources()["src-1"];
    assert_eq!(burj.supported_claims.len(), 1);
    assert_eq!(burj.supported_claims[0].confidence, 0.9);

    // Index 2 had no matching confidence score
    let atlantis = &session.sources()["src-2"];
    assert_eq!(atlantis.title, "b.com");
    assert_eq!(atlantis.supported_claims[0].confidence, 0.5);

    assert_eq!(session.sources()["src-3"].supported_claims[0].confidence, 0.75);
}

#[tokio::test]
async fn test_loop_stops_at_iteration_cap_when_never_passing() {
    let model = ScriptedModel::new(vec![FAIL]);
    let config = Config {
        max_search_iterations: 2,
        ..Config::default()
    };
    let pipeline = build_research_pipeline(&config, model.clone());

    let mut session = SessionState::new();
    session.set_research_plan("- [RESEARCH] Identify luxury hotels in Dubai");
    pipeline.run(&mut session).await.unwrap();

    assert_eq!(model.calls("research_evaluator").await, 2);
    assert_eq!(model.calls("enhanced_search_executor").await, 2);
    assert_eq!(model.calls("report_composer").await, 1);
    assert!(!session.events().iter().any(|e| e.escalate));
    assert!(session.final_report_with_citations().is_some());
}

#[tokio::test]
async fn test_unparseable_verdict_keeps_refining() {
    let model = ScriptedModel::new(vec!["not json at all", PASS]);
    let pipeline = build_research_pipeline(&Config::default(), model.clone());

    let mut session = SessionState::new();
    session.set_research_plan("- [RESEARCH] Identify luxury hotels in Dubai");
    pipeline.run(&mut session).await.unwrap();

    assert_eq!(model.calls("research_evaluator").await, 2);
    assert_eq!(model.calls("enhanced_search_executor").await, 1);
    assert!(session.research_evaluation().unwrap().is_pass());
}

#[tokio::test]
async fn test_execute_without_plan_drafts_one_first() {
    let model = ScriptedModel::new(vec![PASS]);
    let planner = InteractivePlanner::new(&Config::default(), model.clone());
    let mut session = SessionState::new();

    let reply = planner.execute(&mut session).await.unwrap();
    assert!(matches!(reply, PlannerReply::Plan(_)));
    assert_eq!(model.calls("section_planner").await, 0);
}

#[tokio::test]
async fn test_session_round_trip_preserves_source_ids() {
    let model = ScriptedModel::new(vec![PASS]);
    let pipeline = build_research_pipeline(&Config::default(), model);

    let mut session = SessionState::new();
    session.set_research_plan("- [RESEARCH] Identify luxury hotels in Dubai");
    pipeline.run(&mut session).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trip.json");
    session.save(&path).unwrap();

    let restored = SessionState::load(&path).unwrap();
    assert_eq!(restored.url_to_short_id(), session.url_to_short_id());
    assert_eq!(restored.sources(), session.sources());
    assert_eq!(
        restored.final_report_with_citations(),
        session.final_report_with_citations()
    );
}
