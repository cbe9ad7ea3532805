//! Property-based tests for the wizard state machine

use super::*;
use crate::calendar::YearMonth;
use crate::db::{ChatId, Importance, TaskItem};
use crate::transport::MessageId;
use chrono::NaiveDate;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context(chat: i64) -> ChatContext {
    ChatContext::new(ChatId(chat), NaiveDate::from_ymd_opt(2024, 2, 10).unwrap())
}

/// Apply an event, keeping the previous state when the transition is rejected
fn step(
    state: Option<ConversationState>,
    ctx: &ChatContext,
    event: Event,
) -> (Option<ConversationState>, Vec<Effect>) {
    match transition(state.as_ref(), ctx, event) {
        Ok(result) => (result.new_state, result.effects),
        Err(_) => (state, vec![]),
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_importance() -> impl Strategy<Value = Importance> {
    prop_oneof![
        Just(Importance::Red),
        Just(Importance::Blue),
        Just(Importance::Green),
    ]
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (1970i32..2100, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn arb_name() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9 ]{0,30}".prop_map(|s| s.trim().to_string())
}

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Prev), Just(Direction::Next)]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::StartWizard),
        Just(Event::Cancel),
        "[a-zA-Z0-9 .-]{0,20}".prop_map(Event::Text),
        arb_date().prop_map(Event::DateSelected),
        arb_importance().prop_map(Event::ImportanceSelected),
        (arb_direction(), 0i64..5).prop_map(|(direction, id)| Event::NavigateCalendar {
            from: YearMonth::new(2024, 2).unwrap(),
            direction,
            message_id: MessageId(id),
        }),
    ]
}

fn is_user_visible(effect: &Effect) -> bool {
    matches!(
        effect,
        Effect::Prompt(_)
            | Effect::SendCalendar { .. }
            | Effect::EditCalendar { .. }
            | Effect::AskImportance
            | Effect::CommitTask(_)
            | Effect::WriteField { .. }
    )
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // A complete wizard run commits exactly the collected draft and clears state
    #[test]
    fn prop_full_wizard_commits_draft(
        name in arb_name(),
        due in arb_date(),
        importance in arb_importance(),
        typed_date in any::<bool>(),
    ) {
        prop_assume!(!name.is_empty());
        let ctx = test_context(1);

        let (state, _) = step(None, &ctx, Event::StartWizard);
        let (state, _) = step(state, &ctx, Event::Text(name.clone()));
        let date_event = if typed_date {
            Event::Text(due.format("%Y-%m-%d").to_string())
        } else {
            Event::DateSelected(due)
        };
        let (state, _) = step(state, &ctx, date_event);
        let (state, effects) = step(state, &ctx, Event::ImportanceSelected(importance));

        prop_assert!(state.is_none());
        prop_assert_eq!(effects, vec![Effect::CommitTask(TaskItem::new(&name, due, importance))]);
    }

    // Unparsable text at the date step never advances the wizard
    #[test]
    fn prop_invalid_date_text_keeps_step(name in arb_name(), junk in "[a-zA-Z ]{0,20}") {
        let ctx = test_context(1);
        let state = ConversationState::new(ctx.chat_id, WizardStep::AwaitingDueDate { name });

        let (next, effects) = step(Some(state.clone()), &ctx, Event::Text(junk));
        prop_assert_eq!(next, Some(state));
        prop_assert!(
            matches!(&effects[..], [Effect::Prompt(Prompt::InvalidDate { .. })]),
            "expected an invalid date re-prompt, got {:?}",
            effects
        );
    }

    // Every accepted event produces exactly one user-visible effect
    #[test]
    fn prop_one_visible_effect_per_event(events in proptest::collection::vec(arb_event(), 0..25)) {
        let ctx = test_context(1);
        let mut state = None;

        for event in events {
            if let Ok(result) = transition(state.as_ref(), &ctx, event) {
                prop_assert_eq!(
                    result.effects.iter().filter(|e| is_user_visible(e)).count(),
                    1,
                    "effects: {:?}",
                    result.effects
                );
                state = result.new_state;
            }
        }
    }

    // Wizard state always belongs to the chat that produced it
    #[test]
    fn prop_state_stays_in_its_chat(
        chat in 1i64..1000,
        events in proptest::collection::vec(arb_event(), 0..25),
    ) {
        let ctx = test_context(chat);
        let mut state = None;

        for event in events {
            let (next, _) = step(state, &ctx, event);
            if let Some(s) = &next {
                prop_assert_eq!(s.chat_id, ChatId(chat));
            }
            state = next;
        }
    }

    // A calendar is only tracked while a due date is awaited
    #[test]
    fn prop_calendar_only_while_awaiting_date(events in proptest::collection::vec(arb_event(), 0..25)) {
        let ctx = test_context(1);
        let mut state = None;

        for event in events {
            let (next, _) = step(state, &ctx, event);
            if let Some(s) = &next {
                if s.calendar.is_some() {
                    prop_assert!(
                        matches!(s.step, WizardStep::AwaitingDueDate { .. }),
                        "calendar tracked at {}",
                        s.step.name()
                    );
                }
            }
            state = next;
        }
    }

    // Cancel always clears, whatever the wizard was doing
    #[test]
    fn prop_cancel_always_clears(events in proptest::collection::vec(arb_event(), 0..15)) {
        let ctx = test_context(1);
        let mut state = None;
        for event in events {
            state = step(state, &ctx, event).0;
        }

        let (state, effects) = step(state, &ctx, Event::Cancel);
        prop_assert!(state.is_none());
        prop_assert_eq!(effects.len(), 1);
    }
}
