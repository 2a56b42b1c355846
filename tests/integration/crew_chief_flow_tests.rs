//! Crew-chief assignment from the user picker.

use computron::slack::handlers::crew_chief::assign_crew_chief;

use super::test_helpers::{test_config, test_state, FakeChat, FakeCrm};

#[tokio::test]
async fn assignment_confirms_and_logs_note() {
    let chat = FakeChat::new().with_channel("C1", "deal4821");
    chat.set_display_name("U_CHIEF", "Carl Chief");
    let crm = FakeCrm::new();
    let state = test_state(test_config(), &chat, &crm);

    let outcome = assign_crew_chief(&state, "C1", "U_CHIEF")
        .await
        .expect("assignment succeeds");

    assert_eq!(chat.joins(), vec!["C1".to_owned()]);
    assert_eq!(chat.invites(), vec![("C1".to_owned(), "U_CHIEF".to_owned())]);
    let texts = chat.post_texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("Carl Chief"));
    assert_eq!(
        crm.notes(),
        vec![("4821".to_owned(), "Crew Chief assigned is: Carl Chief".to_owned())]
    );
    assert!(outcome.member);
    assert_eq!(outcome.noted_deal.as_deref(), Some("4821"));
}

#[tokio::test]
async fn already_member_is_silent() {
    let chat = FakeChat::new().with_channel("C1", "deal4821");
    chat.fail_join("already_in_channel");
    chat.fail_invite("U_CHIEF", "already_in_channel");
    let state = test_state(test_config(), &chat, &FakeCrm::new());

    let outcome = assign_crew_chief(&state, "C1", "U_CHIEF")
        .await
        .expect("assignment succeeds");

    assert!(outcome.member);
    assert!(!outcome.denied_notice);
    assert_eq!(chat.posts().len(), 1, "only the confirmation");
}

#[tokio::test]
async fn permission_error_posts_notice() {
    let chat = FakeChat::new().with_channel("C1", "deal4821");
    chat.fail_invite("U_CHIEF", "restricted_action");
    let state = test_state(test_config(), &chat, &FakeCrm::new());

    let outcome = assign_crew_chief(&state, "C1", "U_CHIEF")
        .await
        .expect("assignment succeeds");

    assert!(outcome.denied_notice);
    assert!(!outcome.member);
    let texts = chat.post_texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[0].contains("restricted_action"));
    assert!(texts[0].contains("<@U_CHIEF>"));
}

#[tokio::test]
async fn unknown_user_falls_back_to_mention() {
    let chat = FakeChat::new().with_channel("C1", "deal4821");
    let crm = FakeCrm::new();
    let state = test_state(test_config(), &chat, &crm);

    let outcome = assign_crew_chief(&state, "C1", "U_X")
        .await
        .expect("assignment succeeds");

    assert_eq!(outcome.crew_chief, "<@U_X>");
    assert_eq!(crm.notes()[0].1, "Crew Chief assigned is: <@U_X>");
}

#[tokio::test]
async fn crm_failure_is_logged_only() {
    let chat = FakeChat::new().with_channel("C1", "deal4821");
    let crm = FakeCrm::new();
    crm.fail_all();
    let state = test_state(test_config(), &chat, &crm);

    let outcome = assign_crew_chief(&state, "C1", "U_CHIEF")
        .await
        .expect("assignment succeeds");

    assert_eq!(outcome.noted_deal, None);
    assert_eq!(chat.posts().len(), 1);
}

#[tokio::test]
async fn channel_without_deal_skips_note() {
    let chat = FakeChat::new().with_channel("C1", "deal-intake");
    let crm = FakeCrm::new();
    let state = test_state(test_config(), &chat, &crm);

    assign_crew_chief(&state, "C1", "U_CHIEF")
        .await
        .expect("assignment succeeds");

    assert!(crm.notes().is_empty());
}

#[tokio::test]
async fn failed_confirmation_is_an_error() {
    let chat = FakeChat::new().with_channel("C1", "deal4821");
    chat.fail_posts();
    let crm = FakeCrm::new();
    let state = test_state(test_config(), &chat, &crm);

    let result = assign_crew_chief(&state, "C1", "U_CHIEF").await;

    assert!(result.is_err());
    assert!(crm.notes().is_empty());
}
