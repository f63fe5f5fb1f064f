//! A transcript that passes every check, and helpers to break it.

#![allow(dead_code)]

use serde_json::{Value, json};

pub const SYSTEM: &str = "**Objective**: Help the sales team follow up on open deals.\n\n\
**Guidelines**: Use only data returned by the tools. Confirm actions briefly.\n\n\
**Available Tools**: search_deals, get_deal, get_contact, create_task, send_email.";

pub const USER: &str = "Find the Acme Robotics renewal deal, look up its primary contact, \
create a follow-up task due 2025-07-15 titled 'Renewal call', and email the contact \
a short summary with subject 'Acme renewal next steps'.";

fn tool(name: &str, description: &str, params: &[&str]) -> Value {
    let properties: serde_json::Map<String, Value> = params
        .iter()
        .map(|p| (p.to_string(), json!({"type": "string"})))
        .collect();
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": params
            }
        }
    })
}

pub fn tools() -> Value {
    json!([
        tool("search_deals", "Search deals by name", &["query"]),
        tool("get_deal", "Fetch one deal", &["deal_id"]),
        tool("get_contact", "Fetch one contact", &["contact_id"]),
        tool("create_task", "Create a follow-up task", &["deal_id", "title", "due_date"]),
        tool("send_email", "Send an email", &["to", "subject", "message"]),
    ])
}

fn cot(text: &str) -> Value {
    json!({"role": "cot", "content": text})
}

fn call(name: &str, arguments: Value) -> Value {
    json!({
        "role": "assistant",
        "content": null,
        "function_call": {"name": name, "arguments": arguments.to_string()}
    })
}

fn result(name: &str, content: Value) -> Value {
    json!({"role": "function", "name": name, "content": content.to_string()})
}

/// system, user, then five cot/call/result rounds and a final answer.
pub fn conformant_messages() -> Vec<Value> {
    vec![
        json!({"role": "system", "content": SYSTEM}),
        json!({"role": "user", "content": USER}),
        cot("Search for the Acme Robotics deal first."),
        call("search_deals", json!({"query": "Acme Robotics"})),
        result(
            "search_deals",
            json!({"deals": [{"deal_id": "D-20931", "name": "Acme Robotics Renewal", "stage": "negotiation"}]}),
        ),
        cot("Fetch the deal to find its primary contact."),
        call("get_deal", json!({"deal_id": "D-20931"})),
        result(
            "get_deal",
            json!({
                "deal_id": "D-20931",
                "amount": 48000,
                "forecast": {"quarters": [[12000, 36000]]},
                "primary_contact_id": "C-5521"
            }),
        ),
        cot("Look up the contact details."),
        call("get_contact", json!({"contact_id": "C-5521"})),
        result(
            "get_contact",
            json!({"contact_id": "C-5521", "name": "Priya Natarajan", "email": "priya@acmerobotics.com"}),
        ),
        cot("Create the follow-up task on the deal."),
        call(
            "create_task",
            json!({"deal_id": "D-20931", "title": "Renewal call", "due_date": "2025-07-15"}),
        ),
        result("create_task", json!({"task_id": "T-881", "status": "created"})),
        cot("Email the contact with the summary."),
        call(
            "send_email",
            json!({
                "to": "priya@acmerobotics.com",
                "subject": "Acme renewal next steps",
                "message": "Hi Priya, following up on the Acme Robotics renewal."
            }),
        ),
        result("send_email", json!({"status": "sent"})),
        json!({"role": "assistant", "content": "Created task T-881 and emailed Priya Natarajan."}),
    ]
}

pub fn document(messages: Vec<Value>) -> Value {
    json!({"tools": tools(), "messages": messages})
}

pub fn conformant() -> Value {
    document(conformant_messages())
}

/// Index of the first call to `name`.
pub fn call_index(messages: &[Value], name: &str) -> usize {
    messages
        .iter()
        .position(|m| m["function_call"]["name"] == name)
        .expect("call present")
}

/// Replace the arguments of the first call to `name`.
pub fn set_arguments(messages: &mut [Value], name: &str, arguments: Value) {
    let i = call_index(messages, name);
    messages[i]["function_call"]["arguments"] = Value::String(arguments.to_string());
}
