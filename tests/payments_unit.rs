use ifumsa_backend::api::payments::{generate_reference, receipt_code_candidate};
use ifumsa_backend::api::study::share_code_candidate;
use ifumsa_backend::email_is_listed;
use ifumsa_backend::models::PaymentStatus;

#[test]
fn transition_table_allows_forward_movement() {
    use PaymentStatus::*;
    assert!(Pending.can_transition(Submitted));
    assert!(Pending.can_transition(Confirmed));
    assert!(Submitted.can_transition(Confirmed));
    assert!(Submitted.can_transition(Completed));
    assert!(Confirmed.can_transition(Completed));
}

#[test]
fn rejected_is_reachable_from_any_non_terminal_state() {
    use PaymentStatus::*;
    assert!(Pending.can_transition(Rejected));
    assert!(Submitted.can_transition(Rejected));
    assert!(Confirmed.can_transition(Rejected));
}

#[test]
fn terminal_states_are_locked() {
    use PaymentStatus::*;
    for next in [Pending, Submitted, Confirmed, Completed, Rejected] {
        assert!(!Completed.can_transition(next));
        assert!(!Rejected.can_transition(next));
    }
    assert!(Completed.is_terminal());
    assert!(Rejected.is_terminal());
    assert!(!Submitted.is_terminal());
}

#[test]
fn backward_movement_is_rejected() {
    use PaymentStatus::*;
    assert!(!Submitted.can_transition(Pending));
    assert!(!Confirmed.can_transition(Submitted));
    assert!(!Confirmed.can_transition(Pending));
}

#[test]
fn status_round_trips_through_strings() {
    for s in ["pending", "submitted", "confirmed", "completed", "rejected"] {
        let parsed = PaymentStatus::parse(s).expect("known status");
        assert_eq!(parsed.as_str(), s);
    }
    assert!(PaymentStatus::parse("refunded").is_none());
    assert!(PaymentStatus::parse("").is_none());
}

#[test]
fn reference_has_expected_shape() {
    let reference = generate_reference();
    let parts: Vec<&str> = reference.split('-').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "PAY");
    assert!(parts[1].parse::<i64>().unwrap() > 0);
    assert_eq!(parts[2].len(), 8);
    assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn receipt_code_is_six_uppercase_hex_chars() {
    for _ in 0..100 {
        let code = receipt_code_candidate();
        assert_eq!(code.len(), 6);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }
}

#[test]
fn share_code_is_eight_alphanumeric_chars() {
    for _ in 0..100 {
        let code = share_code_candidate();
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}

#[test]
fn admin_email_check_is_case_insensitive() {
    let list = vec!["admin@ifumsa.org".to_string(), "exec@ifumsa.org".to_string()];
    assert!(email_is_listed(&list, "admin@ifumsa.org"));
    assert!(email_is_listed(&list, "ADMIN@IFUMSA.ORG"));
    assert!(email_is_listed(&list, "  Exec@Ifumsa.Org  "));
    assert!(!email_is_listed(&list, "member@ifumsa.org"));
    assert!(!email_is_listed(&[], "admin@ifumsa.org"));
}
