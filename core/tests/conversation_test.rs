use colloquy_core::{ColloquyError, Conversation, Message, Role, ToolCallRequest};
use serde_json::json;

fn request(id: &str) -> ToolCallRequest {
    ToolCallRequest::from_raw(id, "get_latest_news", &json!({"topic": "World"}))
}

#[test]
fn system_message_only_first() {
    let mut c = Conversation::new();
    c.push_user("hi").unwrap();
    let err = c.push(Message::system("late")).unwrap_err();
    assert!(matches!(err, ColloquyError::InvalidConversation(_)));
    assert_eq!(c.len(), 1);
}

#[test]
fn tool_message_must_follow_matching_request() {
    let mut c = Conversation::with_system("sys");
    c.push_user("news?").unwrap();

    // no preceding request
    assert!(c.push_tool_result("call_1", "{}").is_err());

    c.push_tool_request(request("call_1")).unwrap();
    // wrong id
    assert!(c.push_tool_result("call_2", "{}").is_err());
    c.push_tool_result("call_1", "{}").unwrap();

    // a second result for the same request is no longer adjacent
    assert!(c.push_tool_result("call_1", "{}").is_err());
}

#[test]
fn tool_message_without_id_rejected() {
    let mut c = Conversation::new();
    c.push_tool_request(request("c")).unwrap();
    let mut msg = Message::tool("c", "x");
    msg.tool_call_id = None;
    assert!(c.push(msg).is_err());
}

#[test]
fn every_tool_message_follows_its_request() {
    let mut c = Conversation::with_system("sys");
    for i in 0..3 {
        let id = format!("call_{i}");
        c.push_user(format!("q{i}")).unwrap();
        c.push_tool_request(request(&id)).unwrap();
        c.push_tool_result(id.clone(), "result").unwrap();
        c.push_assistant("answer").unwrap();
    }
    let msgs = c.messages();
    for (i, m) in msgs.iter().enumerate() {
        if m.role == Role::Tool {
            let prev = &msgs[i - 1];
            assert_eq!(prev.role, Role::Assistant);
            assert_eq!(
                prev.tool_request.as_ref().map(|r| r.call_id.as_str()),
                m.tool_call_id.as_deref()
            );
        }
    }
}

#[test]
fn deserialize_validates_order() {
    let ok = json!([
        {"role": "system", "content": "Be terse"},
        {"role": "user", "content": "2+2?"}
    ]);
    let c: Conversation = serde_json::from_value(ok).unwrap();
    assert_eq!(c.system_prompt(), Some("Be terse"));

    let bad = json!([
        {"role": "user", "content": "hi"},
        {"role": "tool", "content": "x", "tool_call_id": "c1"}
    ]);
    assert!(serde_json::from_value::<Conversation>(bad).is_err());
}
