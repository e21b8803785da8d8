use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use dawdle::{
    Arg, CancelError, Capabilities, DawdleError, Engine, Func, FutureError, Settled, Status,
    TaskError, TaskListOptions,
};
use serde_json::json;

fn identity() -> Func {
    Func::sync(|args| Ok(Arg::Seq(args)))
}

#[test]
fn future_set_twice_keeps_first_value() {
    let engine = Engine::new();
    let future = engine.future::<i32>();

    future.set(1).unwrap();
    assert_eq!(future.set(2), Err(FutureError::AlreadyResolved));
    assert_eq!(future.value(), Some(1));
}

#[test]
fn future_callback_order() {
    let engine = Engine::new();
    let future = engine.future::<&'static str>();
    let order = Arc::new(Mutex::new(Vec::new()));

    for name in ["a", "b"] {
        let order = order.clone();
        future.add_callback(move |v| order.lock().unwrap().push(format!("{name}({v})")));
    }
    future.set("X").unwrap();
    {
        let order = order.clone();
        future.add_callback(move |v| order.lock().unwrap().push(format!("c({v})")));
    }

    assert_eq!(*order.lock().unwrap(), ["a(X)", "b(X)", "c(X)"]);
}

#[test]
fn task_waits_for_future_argument() {
    let engine = Engine::new();
    let f = engine.future::<Arg>();
    let task = engine.create_task(identity(), [Arg::from("arg"), Arg::from(&f)]);

    let result = Arc::new(Mutex::new(None));
    {
        let result = result.clone();
        task.run(move |outcome| *result.lock().unwrap() = Some(outcome));
    }
    assert!(result.lock().unwrap().is_none());

    f.set(Arg::from("v")).unwrap();

    let outcome = result.lock().unwrap().take().unwrap().unwrap();
    assert_eq!(outcome, Arg::Seq(vec![Arg::from("arg"), Arg::from("v")]));
}

#[test]
fn cancel_rules() -> Result<(), DawdleError> {
    let engine = Engine::new();
    let f = engine.future::<Arg>();
    let task = engine.create_task(identity(), [&f]);

    assert!(task.cancel()?);
    assert_eq!(task.status(), Status::Canceled);
    assert_eq!(task.cancel(), Err(CancelError::AlreadyCanceled));

    f.set(Arg::null())?;
    assert_eq!(task.status(), Status::Canceled);

    let done = engine.create_task(identity(), Vec::<Arg>::new());
    done.run_detached();
    assert!(!done.cancel()?);
    assert_eq!(done.status(), Status::Done);

    Ok(())
}

#[test]
fn ids_increase_process_wide_per_engine() {
    let engine = Engine::new();
    let ids: Vec<_> = (0..5)
        .map(|_| engine.create_task(identity(), Vec::<Arg>::new()).id())
        .collect();

    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn notes_round_trip() {
    let engine = Engine::new();
    let task = engine.create_task(identity(), Vec::<Arg>::new());

    task.note([("a", json!(1))]);
    let mut notes = task.info().notes;
    notes.insert("a".into(), json!(2));

    assert_eq!(task.info().notes["a"], json!(1));
}

#[test]
fn list_skips_canceled_tasks() {
    let engine = Engine::new();
    let list = engine.task_list_with(TaskListOptions::named("batch"));
    let calls = Arc::new(Mutex::new(Vec::new()));

    let lazy = {
        let calls = calls.clone();
        list.lazy_wrap(Func::sync(move |args| {
            calls.lock().unwrap().push(args[0].clone());
            Ok(args[0].clone())
        }))
    };

    let tasks: Vec<_> = (0..4).map(|i| lazy.call([i])).collect();
    tasks[1].cancel().unwrap();
    tasks[3].cancel().unwrap();

    let (tx, rx) = channel();
    list.run(|_| {}, move |all: Vec<Settled>| tx.send(all).unwrap());

    let all = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    let values: Vec<_> = all.iter().filter_map(|s| s.result().cloned()).collect();

    assert_eq!(values, vec![Arg::from(0), Arg::from(2)]);
    assert_eq!(*calls.lock().unwrap(), vec![Arg::from(0), Arg::from(2)]);
}

#[test]
fn completion_from_another_thread() {
    let engine = Engine::new();
    let list = engine.task_list();

    let slow = engine
        .task(Func::callback(|args, done| {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                done.complete(args);
            });
            Ok(Arg::from("slow"))
        }))
        .arg(1)
        .note("kind", json!("background"))
        .create();
    let fast = engine.create_task(Func::sync(|_| Ok(Arg::from("fast"))), Vec::<Arg>::new());

    list.add(slow.clone());
    list.add(fast);

    let (tx, rx) = channel();
    list.run(|_| {}, move |all| tx.send(all).unwrap());

    let all = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    let order: Vec<_> = all.iter().filter_map(|s| s.result().cloned()).collect();

    assert_eq!(order, vec![Arg::from("fast"), Arg::from("slow")]);
    assert_eq!(slow.status(), Status::Done);
    assert_eq!(slow.info().notes["kind"], json!("background"));
    assert!(list.is_empty());
}

#[test]
fn run_errors_do_not_stop_the_batch() {
    let engine = Engine::new();
    let list = engine.task_list();

    list.add(engine.create_task(Func::sync(|_| panic!("bad task")), Vec::<Arg>::new()));
    list.add(engine.create_task(identity(), [true]));

    let (tx, rx) = channel();
    list.run(|_| {}, move |all| tx.send(all).unwrap());
    let all = rx.recv().unwrap();

    assert!(matches!(all[0].error(), Some(TaskError::Panicked(_))));
    assert_eq!(all[1].result(), Some(&Arg::Seq(vec![Arg::from(true)])));
}

#[test]
fn lazy_capabilities_through_engine() {
    let engine = Engine::new();
    let api = engine.wrap_lazy(
        Capabilities::new()
            .op("sum", Func::sync(|args| {
                let total: i64 = args
                    .iter()
                    .filter_map(|a| a.as_value().and_then(|v| v.as_i64()))
                    .sum();
                Ok(Arg::from(total))
            }))
            .value("name", "calculator"),
    );

    let task = api.call("sum", [1, 2, 3]).unwrap();
    assert_eq!(task.status(), Status::Procrastinating);

    let (tx, rx) = channel();
    task.run(move |outcome| tx.send(outcome).unwrap());

    assert_eq!(rx.recv().unwrap().unwrap(), Arg::from(6i64));
    assert_eq!(api.value("name"), Some(&Arg::from("calculator")));
}
