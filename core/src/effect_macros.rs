//! Declarative macros for ergonomic effect construction
//!
//! The lifecycle reducer mostly returns two kinds of effects: an async block
//! that talks to the record store or access directory and reports back with a
//! result action, and a delayed action used for draft expiry.

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use whitelist_core::async_effect;
///
/// async_effect! {
///     let record = records.get_by_submitter(submitter).await;
///     Some(LifecycleAction::Loaded { record })
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Delay` for scheduling delayed actions
///
/// # Example
///
/// ```rust,ignore
/// use whitelist_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     duration: Duration::from_secs(900),
///     action: LifecycleAction::ExpireDraft { submitter, draft_id }
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}

/// Create an `Effect::Future` that immediately reports an action
///
/// Used when the reducer can answer a command without any I/O but the answer
/// still has to reach whoever is waiting on the result broadcast.
///
/// # Example
///
/// ```rust,ignore
/// use whitelist_core::respond;
///
/// respond!(LifecycleAction::DraftCancelled { correlation_id })
/// ```
#[macro_export]
macro_rules! respond {
    ($action:expr) => {{
        let action = $action;
        $crate::effect::Effect::Future(::std::boxed::Box::pin(async move { Some(action) }))
    }};
}

#[cfg(test)]
mod tests {
    use crate::effect::Effect;
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    enum TestAction {
        Loaded { value: i32 },
        Expired,
    }

    #[test]
    fn test_async_effect_macro() {
        let effect = async_effect! {
            Some(TestAction::Loaded { value: 42 })
        };

        assert!(matches!(effect, Effect::Future(_)));
    }

    #[test]
    fn test_delay_macro() {
        let effect = delay! {
            duration: Duration::from_secs(30),
            action: TestAction::Expired
        };

        match effect {
            Effect::Delay { duration, action } => {
                assert_eq!(duration, Duration::from_secs(30));
                assert_eq!(*action, TestAction::Expired);
            },
            other => unreachable!("expected delay, got {other:?}"),
        }
    }

    #[test]
    fn test_respond_macro_yields_action() {
        let effect = respond!(TestAction::Loaded { value: 7 });
        let Effect::Future(fut) = effect else {
            unreachable!("respond! must build a future effect");
        };
        let action = tokio_test::block_on(fut);
        assert_eq!(action, Some(TestAction::Loaded { value: 7 }));
    }
}
