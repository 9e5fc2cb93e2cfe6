use serde_json::{Value, json};
use stackprobe::MessageRole;
use stackprobe::prelude::*;
use stackprobe::tools::ToolError;
use std::sync::Mutex;

const ORDERS: &str = r#"def total(order):
    subtotal = sum(order["items"])
    # the discount is applied last
    return apply_discount(subtotal, order["discount"])

def apply_discount(amount, discount):
    if discount > amount:
        raise ValueError("discount too large")
    return amount - discount"#;

fn snapshot() -> Value {
    json!({
        "frames": [
            {"path": "app/main.py", "line": 5, "function": "main",
             "locals": {"data": {"items": [1, 2], "discount": 5}}},
            {"path": "/usr/lib/python3/site-packages/retry/wrap.py", "line": 3, "function": "call"},
            {"path": "app/orders.py", "line": 4, "function": "total",
             "arguments": {"order": {"items": [1, 2], "discount": 5}},
             "locals": {"subtotal": 3}},
            {"path": "app/orders.py", "line": 8, "function": "apply_discount",
             "arguments": {"amount": 3, "discount": 5}},
        ],
        "sources": {
            "app/main.py": "import orders\n\ndef main():\n    data = load()\n    print(orders.total(data))",
            "/usr/lib/python3/site-packages/retry/wrap.py": "def call(fn, *args):\n    # retry wrapper\n    return fn(*args)",
            "app/orders.py": ORDERS,
        },
        "definitions": {
            "apply_discount": {"path": "app/orders.py", "line": 6, "end_line": 9},
        },
        "breakpoints": {"app/orders.py": [8]},
    })
}

fn session(hide_external: bool) -> Session {
    let debugger = SnapshotDebugger::from_value(snapshot()).unwrap();
    Session::new(Box::new(debugger), hide_external)
}

fn config() -> AgentConfig {
    AgentConfig::default()
        .with_show_progress(false)
        .with_retries(0)
}

fn move_up() -> Value {
    json!({"explanation": "inspect the caller", "direction": "up"})
}

#[tokio::test]
async fn depth_limit_forces_the_answer() {
    let provider = ScriptedProvider::new()
        .then_tool("expression", json!({"expression": "discount"}))
        .then_tool("expression", json!({"expression": "amount"}))
        .then_text("The discount (5) exceeds the amount (3).");
    let mut session = session(true);
    let mut agent = Agent::new(&provider, config().with_max_depth(2));

    let answer = agent.ask(&mut session, "why did this raise?").await.unwrap();
    assert_eq!(answer, "The discount (5) exceeds the amount (3).");

    let entries = agent.trajectory().entries();
    assert_eq!(entries.len(), 3);
    assert!(entries[2].call_id.starts_with("forced_"));

    let requests = provider.requests();
    assert_eq!(requests.len(), 3);
    let answer_request = &requests[2];
    assert!(answer_request.tools.is_none());
    let system = answer_request.messages[0].content.as_deref().unwrap();
    assert!(system.contains("<variables>\ndiscount = 5\namount = 3\n</variables>"));
}

#[tokio::test]
async fn args_cannot_repeat_in_the_same_frame() {
    let provider = ScriptedProvider::new()
        .then_tool("args", json!({}))
        .then_tool("args", json!({}))
        .then_tool("answer", json!({}))
        .then_text("done");
    let mut session = session(true);
    let mut agent = Agent::new(&provider, config());
    agent.ask(&mut session, "what are the args?").await.unwrap();

    let entries = agent.trajectory().entries();
    assert_eq!(entries[0].rendered, "amount = 3\ndiscount = 5");
    assert!(matches!(
        entries[1].result,
        ToolResult::Error(ToolError::Validation(_))
    ));
    assert!(entries[1].rendered.contains("not available"));

    // The second round no longer offers `args`.
    let offered: Vec<String> = provider.requests()[1]
        .tools
        .as_ref()
        .unwrap()
        .iter()
        .map(|t| t.name().to_string())
        .collect();
    assert!(!offered.contains(&"args".to_string()));
    assert!(offered.contains(&"answer".to_string()));
}

#[tokio::test]
async fn navigation_skips_external_frames_and_is_restored() {
    let provider = ScriptedProvider::new()
        .then_tool("move", move_up())
        .then_tool("move", move_up())
        .then_tool("move", move_up())
        .then_tool("expression", json!({"expression": "data[\"discount\"]"}))
        .then_tool("answer", json!({}))
        .then_text("main passed a discount of 5.");
    let mut session = session(true);
    let mut agent = Agent::new(&provider, config());
    agent.ask(&mut session, "where does the discount come from?").await.unwrap();

    let entries = agent.trajectory().entries();
    assert_eq!(
        entries[0].result,
        ToolResult::Moved {
            direction: Direction::Up,
            from: 3,
            frame_index: 2,
        }
    );
    assert_eq!(
        entries[1].result,
        ToolResult::Moved {
            direction: Direction::Up,
            from: 2,
            frame_index: 0,
        }
    );
    // At the oldest frame `up` is no longer in the schema's enum.
    assert!(entries[2].result.is_error());
    assert!(entries[2].rendered.contains("argument validation failed"));
    assert_eq!(entries[3].result.frame_index(), Some(0));
    assert!(entries[3].rendered.contains('5'));

    assert_eq!(session.current_index(), 3);

    // The origin and the frame the expression was read in are both shown.
    let requests = provider.requests();
    let system = requests[5].messages[0].content.as_deref().unwrap();
    assert!(system.contains("<stack_entry>\n  app/main.py(5)main()"));
    assert!(system.contains("<stack_entry>\n> app/orders.py(8)apply_discount()"));
    assert!(!system.contains("<stack_entry>\n  app/orders.py(4)total()"));
}

#[tokio::test]
async fn external_frames_are_visited_when_not_hidden() {
    let provider = ScriptedProvider::new()
        .then_tool("move", move_up())
        .then_tool("move", move_up())
        .then_tool("answer", json!({}))
        .then_text("ok");
    let mut session = session(false);
    let mut agent = Agent::new(&provider, config());
    agent.ask(&mut session, "what called total?").await.unwrap();

    let entries = agent.trajectory().entries();
    assert_eq!(entries[1].result.frame_index(), None);
    assert_eq!(
        entries[1].result,
        ToolResult::Moved {
            direction: Direction::Up,
            from: 2,
            frame_index: 1,
        }
    );
}

#[tokio::test]
async fn source_and_file_search_feed_code_context() {
    let provider = ScriptedProvider::new()
        .then_tool("source", json!({"object": "apply_discount"}))
        .then_tool("file", json!({"explanation": "find the caller", "query": "total"}))
        .then_text(r#"{"chunks": [{"first": 1, "last": 2}]}"#)
        .then_tool("answer", json!({}))
        .then_text("See apply_discount.");
    let mut session = session(true);
    let mut agent = Agent::new(&provider, config());
    agent.ask(&mut session, "show me the code").await.unwrap();

    let requests = provider.requests();
    assert_eq!(requests.len(), 5);
    // The file search request goes out with a response format and no tools.
    assert!(requests[2].response_format.is_some());
    assert!(requests[2].tools.is_none());

    let system = requests[4].messages[0].content.as_deref().unwrap();
    let context = system.split("<code_context>").nth(1).unwrap();
    assert_eq!(context.matches("<path>\napp/orders.py\n</path>").count(), 1);
    assert!(context.contains("1 def total(order):\n2     subtotal = sum(order[\"items\"])"));
    assert!(context.contains("9     return amount - discount"));
}

#[tokio::test]
async fn failed_answer_restores_the_session() {
    let provider = ScriptedProvider::new()
        .then_tool("move", move_up())
        .then_tool("answer", json!({}))
        .then_error("OpenRouter API HTTP 401: unauthorized");
    let mut session = session(true);
    let mut agent = Agent::new(&provider, config());

    let err = agent.ask(&mut session, "why?").await.unwrap_err();
    assert!(matches!(err, AgentError::Completion(ref e) if e.contains("401")));
    assert_eq!(session.current_index(), 3);
    assert!(!agent.is_follow_up());
}

#[tokio::test]
async fn follow_up_sees_previous_answer() {
    let provider = ScriptedProvider::new()
        .then_tool("answer", json!({}))
        .then_text("Because discount > amount.")
        .then_tool("answer", json!({}))
        .then_text("Lower the discount.");
    let mut session = session(true);
    let mut agent = Agent::new(&provider, config());

    agent.ask(&mut session, "why?").await.unwrap();
    assert!(agent.is_follow_up());
    agent.ask(&mut session, "how do I fix it?").await.unwrap();

    let requests = provider.requests();
    let answer_messages = &requests[3].messages;
    assert_eq!(answer_messages[0].role, MessageRole::System);
    assert_eq!(
        answer_messages[2].content.as_deref(),
        Some("Because discount > amount.")
    );
    assert_eq!(
        answer_messages.last().unwrap().content.as_deref(),
        Some("how do I fix it?")
    );
}

#[tokio::test]
async fn follow_up_replays_only_its_own_tool_calls() {
    let provider = ScriptedProvider::new()
        .then_tool("args", json!({}))
        .then_tool("answer", json!({}))
        .then_text("discount is 5, amount is 3.")
        .then_tool("answer", json!({}))
        .then_text("Check the discount first.");
    let mut session = session(true);
    let mut agent = Agent::new(&provider, config());

    agent.ask(&mut session, "what are the args?").await.unwrap();
    agent.ask(&mut session, "how do I fix it?").await.unwrap();

    let requests = provider.requests();
    assert_eq!(requests.len(), 5);
    let turn_one_ids: Vec<String> = agent.trajectory().entries()[..2]
        .iter()
        .map(|e| e.call_id.clone())
        .collect();

    // Nothing from the first turn follows the new question.
    let messages = &requests[3].messages;
    let question = messages
        .iter()
        .rposition(|m| m.role == MessageRole::User)
        .unwrap();
    assert_eq!(messages[question].content.as_deref(), Some("how do I fix it?"));
    assert_eq!(messages.len(), question + 1);
    for message in &messages[question..] {
        let replayed = message.tool_call_id.iter().chain(
            message
                .tool_calls
                .iter()
                .flatten()
                .map(|call| &call.id),
        );
        for id in replayed {
            assert!(!turn_one_ids.contains(id), "{id} replayed after the follow-up");
        }
    }

    // `args` is offered again in the same frame.
    assert!(
        requests[3]
            .tools
            .as_ref()
            .unwrap()
            .iter()
            .any(|t| t.name() == "args")
    );

    // The answer still sees what the first turn gathered.
    let system = requests[4].messages[0].content.as_deref().unwrap();
    assert!(system.contains("<args>\namount = 3\ndiscount = 5\n</args>"));
}

#[tokio::test]
async fn events_report_each_tool_call() {
    let seen = Mutex::new(Vec::new());
    let handler = FnEventHandler::new(|event| {
        if let AgentEvent::ToolExecuting { name, .. } = event {
            seen.lock().unwrap().push(name.to_string());
        }
    });
    let provider = ScriptedProvider::new()
        .then_tool("retval", json!({}))
        .then_tool("answer", json!({}))
        .then_text("It has not returned yet.");
    let mut session = session(true);
    let mut agent = Agent::new(&provider, config()).with_event_handler(&handler);
    agent.ask(&mut session, "what did it return?").await.unwrap();

    assert_eq!(agent.trajectory().entries()[0].rendered, "Not yet returned.");
    drop(agent);
    assert_eq!(*seen.lock().unwrap(), vec!["retval", "answer"]);
}

#[test]
fn snapshot_loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("app")).unwrap();
    std::fs::write(dir.path().join("app/orders.py"), ORDERS).unwrap();
    let mut snap = snapshot();
    snap["sources"].as_object_mut().unwrap().remove("app/orders.py");
    let path = dir.path().join("stack.json");
    std::fs::write(&path, snap.to_string()).unwrap();

    let debugger = SnapshotDebugger::from_path(&path).unwrap();
    let mut session = Session::new(Box::new(debugger), true);
    assert_eq!(
        session.format_stack_entry(3),
        "app/orders.py(8)apply_discount()\n-> raise ValueError(\"discount too large\")"
    );
}
