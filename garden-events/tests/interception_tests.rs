//! Integration tests for firing order, filters and method interception.

use garden_events::*;
use serde_json::{json, Value};
use std::any::Any;
use std::sync::{Arc, Mutex};

fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &'static str, result: Value) -> Handler {
    let log = log.clone();
    handler(move |_| {
        log.lock().unwrap().push(label.to_string());
        Ok(result.clone())
    })
}

#[derive(Default)]
struct Greeter {
    calls: u32,
}

fn call_greet(bus: &EventBus, greeter: &mut Greeter, args: Vec<Value>) -> HandlerResult {
    let body = |subject: &mut dyn Any, args: &[Value]| -> HandlerResult {
        let greeter = subject
            .downcast_mut::<Greeter>()
            .ok_or_else(|| EventError::InvalidArgument("not a greeter".into()))?;
        greeter.calls += 1;
        Ok(json!(format!("hello {}", args[0].as_str().unwrap_or("?"))))
    };

    bus.call_user_func_array(
        Callback::Method {
            class: "App\\Greeter",
            method: "greet",
            subject: greeter,
            invoke: &body,
        },
        args,
    )
}

#[test]
fn test_priority_order_ignores_binding_order() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    bus.bind_with_priority("boot", recorder(&log, "low", json!(3)), PRIORITY_LOW);
    bus.bind_with_priority("boot", recorder(&log, "high", json!(1)), PRIORITY_HIGH);
    bus.bind_with_priority("boot", recorder(&log, "medium", json!(2)), PRIORITY_MEDIUM);

    let last = bus.fire("boot", Vec::new()).unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["high", "medium", "low"]);
    assert_eq!(last, Some(json!(3)));
}

#[test]
fn test_filter_increments() {
    let bus = EventBus::new();
    for _ in 0..2 {
        bus.bind(
            "inc",
            handler(|args| Ok(json!(args.arg(0).and_then(Value::as_i64).unwrap_or(0) + 1))),
        );
    }

    assert_eq!(bus.fire_filter("inc", json!(0), vec![]).unwrap(), json!(2));
}

#[test]
fn test_handler_ordering_is_stable_between_binds() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    bus.bind_with_priority("e", recorder(&log, "b", Value::Null), PRIORITY_LOW);
    bus.bind_with_priority("e", recorder(&log, "a", Value::Null), PRIORITY_HIGH);

    let first: Vec<i32> = bus.get_handlers("e").iter().map(|h| h.priority).collect();
    for _ in 0..5 {
        let again: Vec<i32> = bus.get_handlers("e").iter().map(|h| h.priority).collect();
        assert_eq!(again, first);
    }
    assert_eq!(first, vec![PRIORITY_HIGH, PRIORITY_LOW]);
}

#[test]
fn test_native_method_runs_between_before_and_after() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    bus.bind("greeter_greet_before", recorder(&log, "before", Value::Null));
    bus.bind("greeter_greet_after", recorder(&log, "after", Value::Null));

    let mut greeter = Greeter::default();
    let result = call_greet(&bus, &mut greeter, vec![json!("todd")]).unwrap();

    assert_eq!(result, json!("hello todd"));
    assert_eq!(greeter.calls, 1);
    assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);
}

#[test]
fn test_override_replaces_method_and_hooks_still_fire() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    bus.bind("greeter_greet_before", recorder(&log, "before", Value::Null));
    bus.bind("greeter_greet", recorder(&log, "override", json!("overridden")));
    bus.bind("greeter_greet_after", recorder(&log, "after", Value::Null));

    let mut greeter = Greeter::default();
    let result = call_greet(&bus, &mut greeter, vec![json!("todd")]).unwrap();

    assert_eq!(result, json!("overridden"));
    assert_eq!(greeter.calls, 0);
    assert_eq!(*log.lock().unwrap(), vec!["before", "override", "after"]);
}

#[test]
fn test_override_sees_the_subject() {
    let bus = EventBus::new();
    bus.bind(
        "greeter_greet",
        handler(|args| {
            let name = args.str(0).unwrap_or("?").to_string();
            let greeter = args
                .subject::<Greeter>()
                .ok_or_else(|| EventError::InvalidArgument("no subject".into()))?;
            greeter.calls += 10;
            Ok(json!(format!("hi {}", name)))
        }),
    );

    let mut greeter = Greeter::default();
    let result = call_greet(&bus, &mut greeter, vec![json!("ann")]).unwrap();
    assert_eq!(result, json!("hi ann"));
    assert_eq!(greeter.calls, 10);
}

#[test]
fn test_functions_are_not_intercepted() {
    let bus = EventBus::new();
    let double = |args: &[Value]| -> HandlerResult {
        Ok(json!(args[0].as_i64().unwrap_or(0) * 2))
    };

    let result = bus
        .call_user_func_array(Callback::Function(&double), vec![json!(21)])
        .unwrap();
    assert_eq!(result, json!(42));
}

struct Plugin;

impl Subscriber for Plugin {
    fn subscriptions(self: Arc<Self>) -> Vec<Subscription> {
        vec![
            Subscription::from_method_name("greeter_greet_override", handler(|_| Ok(json!("plugin")))),
            Subscription::from_method_name("greeter_greet_after", handler(|_| Ok(Value::Null))),
        ]
    }
}

#[test]
fn test_subscriber_overrides_method() {
    let bus = EventBus::new();
    bus.register_instance("plugin", Arc::new(Plugin));
    bus.bind_class("plugin", PRIORITY_MEDIUM).unwrap();

    assert!(bus.has_handler("greeter_greet"));
    assert!(bus.has_handler("greeter_greet_after"));

    let mut greeter = Greeter::default();
    assert_eq!(
        call_greet(&bus, &mut greeter, vec![json!("x")]).unwrap(),
        json!("plugin")
    );
}
