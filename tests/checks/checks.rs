mod fixtures;

use fixtures::{call_index, conformant, conformant_messages, document, set_arguments};
use provcheck::core::provenance;
use provcheck::core::report::{CheckName, CheckStatus, Severity};
use provcheck::core::transcript::Transcript;
use provcheck::core::validate::Validator;
use serde_json::{Value, json};

fn validator() -> Validator {
    Validator::stock().expect("embedded schema loads")
}

fn failed(doc: &Value) -> Vec<CheckName> {
    validator().validate_document("t.json", doc).failed_checks()
}

#[test]
fn conformant_transcript_passes_every_check() {
    let report = validator().validate_document("ok.json", &conformant());
    assert!(report.passed, "unexpected issues: {:?}", report.errors);
    assert!(report.issues.is_empty());
    assert!(report.errors.is_empty());
    assert_eq!(report.total_function_calls, 5);
    assert_eq!(report.unique_functions_called, 5);
    assert_eq!(
        report.function_call_breakdown,
        "search_deals:1; get_deal:1; get_contact:1; create_task:1; send_email:1"
    );
}

#[test]
fn validation_is_deterministic() {
    let mut messages = conformant_messages();
    set_arguments(&mut messages, "get_contact", json!({"contact_id": "C-9999"}));
    let doc = document(messages);
    let v = validator();
    let first = v.validate_document("d.json", &doc);
    let second = v.validate_document("d.json", &doc);
    assert_eq!(first, second);
    assert!(!first.passed);
}

#[test]
fn value_produced_later_is_untracked() {
    let mut messages = conformant_messages();
    // D-20931 is first produced by the search result that follows this call.
    set_arguments(&mut messages, "search_deals", json!({"query": "D-20931"}));
    let doc = document(messages);

    let transcript = Transcript::from_value(&doc).unwrap();
    let (_, flow) = validator().trace_flow(&transcript);
    let search = &flow.records[0];
    assert_eq!(search.function_name, "search_deals");
    assert_eq!(search.untracked().count(), 1);

    let report = validator().validate_document("late.json", &doc);
    assert_eq!(report.parameter_flow_check, CheckStatus::Fail);
    assert_eq!(report.hallucination_check, CheckStatus::Fail);
    let flow_issue = report
        .issues_for(CheckName::ParameterFlowCheck)
        .next()
        .unwrap();
    assert_eq!(flow_issue.message_index, Some(3));
    assert!(flow_issue.message.contains("'D-20931'"));
}

#[test]
fn value_from_earlier_output_is_tracked_with_origin() {
    let transcript = Transcript::from_value(&conformant()).unwrap();
    let validator = validator();
    let (index, flow) = validator.trace_flow(&transcript);
    let get_deal = flow
        .records
        .iter()
        .find(|r| r.function_name == "get_deal")
        .unwrap();
    let deal_id = &get_deal.arguments[0];
    assert!(!deal_id.is_untracked());
    assert_eq!(
        deal_id.source.as_ref().unwrap().to_string(),
        "search_deals output (deals[0].deal_id)"
    );

    let summary = provenance::render_summary(&flow, &index);
    assert!(summary.starts_with("Parameter Flow Summary:"));
    assert!(summary.contains("  get_contact (message 9):"));
    // Only free text is left without a source, and it is flow-exempt.
    let untracked: Vec<(&str, &str)> = flow
        .records
        .iter()
        .flat_map(|r| r.untracked().map(move |a| (r.function_name.as_str(), a.name.as_str())))
        .collect();
    assert_eq!(untracked, vec![("send_email", "message")]);
    assert!(validator.config().is_flow_exempt("message"));
    assert!(summary.contains("  send_email (message 15):"));
    assert_eq!(summary.matches("Untracked parameters:").count(), 1);
    assert!(summary.contains("    Untracked parameters: message\n"));
}

#[test]
fn missing_cot_fails_structure_only() {
    let mut messages = conformant_messages();
    let i = call_index(&messages, "get_contact");
    assert_eq!(messages[i - 1]["role"], "cot");
    messages.remove(i - 1);

    let report = validator().validate_document("nocot.json", &document(messages));
    assert_eq!(report.failed_checks(), vec![CheckName::MessageStructure]);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(
        report.errors[0],
        "Message structure: Function call for 'get_contact' not preceded by CoT message"
    );
}

#[test]
fn placeholder_argument_fails_placeholder_only() {
    let mut messages = conformant_messages();
    set_arguments(
        &mut messages,
        "get_deal",
        json!({"deal_id": "D-20931", "api_key": "YOUR_API_KEY"}),
    );
    let report = validator().validate_document("ph.json", &document(messages));
    assert_eq!(report.failed_checks(), vec![CheckName::PlaceholderCheck]);
    assert!(
        report.errors[0].contains("Found placeholder 'YOUR_API_KEY' in arguments of function 'get_deal'")
    );
}

#[test]
fn nested_output_integer_is_traceable() {
    let mut messages = conformant_messages();
    set_arguments(
        &mut messages,
        "create_task",
        json!({"deal_id": "D-20931", "title": "Renewal call", "due_date": "2025-07-15", "amount": 36000}),
    );
    let report = validator().validate_document("nested.json", &document(messages.clone()));
    assert!(report.passed, "unexpected issues: {:?}", report.errors);

    set_arguments(
        &mut messages,
        "create_task",
        json!({"deal_id": "D-20931", "title": "Renewal call", "due_date": "2025-07-15", "amount": 36001}),
    );
    let report = validator().validate_document("altered.json", &document(messages));
    assert_eq!(
        report.failed_checks(),
        vec![CheckName::ParameterFlowCheck, CheckName::HallucinationCheck]
    );
    let advisory = report
        .issues_for(CheckName::HallucinationCheck)
        .next()
        .unwrap();
    assert_eq!(advisory.severity, Severity::Advisory);
    assert!(advisory.message.contains("'36001' in parameter 'amount'"));
}

#[test]
fn untracked_identifier_needs_user_phrasing() {
    let with_order = |user: &str| {
        let mut messages = conformant_messages();
        messages[1]["content"] = Value::String(user.to_string());
        set_arguments(
            &mut messages,
            "get_contact",
            json!({"contact_id": "C-5521", "order_id": "ORD-77125"}),
        );
        document(messages)
    };

    let supplied = with_order(&format!("{} Reference order_id: A1234.", fixtures::USER));
    let report = validator().validate_document("order.json", &supplied);
    assert_eq!(report.user_identifier_check, CheckStatus::Pass);

    let bare = with_order(fixtures::USER);
    let report = validator().validate_document("order.json", &bare);
    assert_eq!(report.user_identifier_check, CheckStatus::Fail);
    let issue = report
        .issues_for(CheckName::UserIdentifierCheck)
        .next()
        .unwrap();
    assert_eq!(
        issue.message,
        "Function calls use 'order_id' but no user message provides a order identifier"
    );
}

#[test]
fn undeclared_tool_fails_function_validation() {
    let mut doc = conformant();
    doc["tools"].as_array_mut().unwrap().pop();
    let failed = failed(&doc);
    assert_eq!(failed, vec![CheckName::FunctionValidation]);
}

#[test]
fn external_tools_override_declared_tools() {
    let validator = validator().with_tools(
        provcheck::core::transcript::ToolCatalog::from_value(&fixtures::tools()),
    );
    let mut doc = conformant();
    doc["tools"] = json!([]);
    let report = validator.validate_document("ext.json", &doc);
    assert!(report.passed, "unexpected issues: {:?}", report.errors);
}

#[test]
fn empty_function_result_fails_function_validation() {
    let mut messages = conformant_messages();
    let i = call_index(&messages, "send_email");
    messages[i + 1]["content"] = json!("   ");
    let failed = failed(&document(messages));
    assert_eq!(failed, vec![CheckName::FunctionValidation]);
}

#[test]
fn credential_leak_fails_token_consistency() {
    let mut messages = conformant_messages();
    messages[1]["content"] = Value::String(format!(
        "{}\n\n**API Keys and Tokens**\n- CRM Token: crm_live_83hd02",
        fixtures::USER
    ));
    set_arguments(
        &mut messages,
        "get_contact",
        json!({"contact_id": "C-5521", "CRM Token": "x"}),
    );
    let report = validator().validate_document("tok.json", &document(messages));
    assert_eq!(report.token_consistency, CheckStatus::Fail);
}
