use std::cell::{Cell, RefCell};
use std::rc::Rc;

use proptest::prelude::*;
use tracing_test::traced_test;

use super::*;
use crate::collections::QueueOrder;
use crate::component::ActivateOptions;
use crate::context::HoldOptions;
use crate::generator::Generator;
use crate::priority::Priority;
use crate::process::{process_fn, Outcome, Process};
use crate::resource::{Request, ResourceSpec};
use crate::state::{State, StateRequest, Wait};

// ── Helpers ───────────────────────────────────────────────────────────

fn served(r: ResourceId, duration: f64) -> impl Process {
    let mut phase = 0;
    process_fn(move |cx: &mut Context<'_>| {
        phase += 1;
        match phase {
            1 => {
                if let Outcome::Suspended(y) = cx.request(Request::new(r))? {
                    return Ok(y);
                }
                phase += 1;
                cx.hold(duration)
            }
            2 => cx.hold(duration),
            _ => {
                cx.release(r)?;
                cx.terminate()
            }
        }
    })
}

/// Holds once for `duration`, then terminates.
fn sleeper(duration: f64) -> impl Process {
    let mut held = false;
    process_fn(move |cx: &mut Context<'_>| {
        if held {
            return cx.terminate();
        }
        held = true;
        cx.hold(duration)
    })
}

fn bank(seed: u64) -> Environment {
    let mut env = Environment::builder().seed(seed).record_trace().build();
    let clerks = env.create_resource(ResourceSpec::new("clerks", 2.0)).unwrap();
    let arrivals = Generator::new(
        |s: &mut dyn Sampler| s.exponential(3.0),
        move |cx: &mut Context<'_>, _n: u64| {
            let service = cx.sampler().uniform(2.0, 6.0);
            cx.spawn("Customer.", served(clerks, service))
        },
    )
    .total(30);
    env.spawn("arrivals", arrivals).unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    env
}

fn times(log: &Rc<RefCell<Vec<f64>>>) -> Vec<f64> {
    log.borrow().clone()
}

// ── Determinism & clock ───────────────────────────────────────────────

#[test]
fn test_same_seed_same_trace() {
    let a = bank(7);
    let b = bank(7);
    assert!(!a.trace().is_empty());
    assert_eq!(a.trace_hash(), b.trace_hash());
    assert_eq!(a.now(), b.now());
    assert_eq!(a.events_processed(), b.events_processed());
    assert_ne!(a.trace_hash(), bank(8).trace_hash());
    // generator plus 30 customers
    assert_eq!(a.component_count(), 31);
}

#[test]
fn test_trace_times_never_decrease() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let mut env = Environment::builder()
        .listener(move |r: &TraceRecord| sink.borrow_mut().push((r.seq, r.time)))
        .build();
    for d in [5.0, 1.0, 3.0, 3.0, 0.0] {
        env.spawn("Sleeper.", sleeper(d)).unwrap();
    }
    env.run(RunUntil::Quiescent).unwrap();
    let seen = seen.borrow();
    assert!(seen.windows(2).all(|w| w[0].0 < w[1].0 && w[0].1 <= w[1].1));
    assert_eq!(env.now(), TickTime::at(5.0));
}

#[test]
fn test_same_time_events_follow_priority_then_urgency() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut env = Environment::default();
    let specs = [
        ("a", Priority::NORMAL, false),
        ("b", Priority::NORMAL, true),
        ("c", Priority::IMPORTANT, false),
        ("d", Priority::LOW, false),
        ("e", Priority::NORMAL, false),
    ];
    for (name, priority, urgent) in specs {
        let log = log.clone();
        let mut options = ActivateOptions::new().at(TickTime::at(5.0)).priority(priority);
        if urgent {
            options = options.urgent();
        }
        env.spawn_with(
            name,
            process_fn(move |cx: &mut Context<'_>| {
                log.borrow_mut().push(cx.name().to_string());
                cx.terminate()
            }),
            options,
        )
        .unwrap();
    }
    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(*log.borrow(), vec!["c", "b", "a", "e", "d"]);
}

// ── Run control ───────────────────────────────────────────────────────

#[test]
fn test_event_at_deadline_stays_pending() {
    let mut env = Environment::default();
    let c = env.spawn("c", sleeper(5.0)).unwrap();
    let summary = env.run(RunUntil::Time(TickTime::at(5.0))).unwrap();
    assert_eq!(summary.reason, StopReason::Deadline);
    assert_eq!(summary.final_time, TickTime::at(5.0));
    assert_eq!(env.component_state(c).unwrap(), ComponentState::Scheduled);
    assert_eq!(env.pending_events(), 1);
    assert_eq!(env.peek_next_time(), Some(TickTime::at(5.0)));

    let summary = env.run(RunUntil::Duration(1.0)).unwrap();
    assert_eq!(summary.events_processed, 1);
    assert_eq!(summary.final_time, TickTime::at(6.0));
    assert_eq!(env.component_state(c).unwrap(), ComponentState::Terminated);
}

#[test]
fn test_empty_queue_policies() {
    let mut idle = Environment::default();
    idle.spawn("c", sleeper(2.0)).unwrap();
    let summary = idle.run(RunUntil::Time(TickTime::at(10.0))).unwrap();
    assert_eq!(summary.reason, StopReason::Exhausted);
    assert_eq!(summary.final_time, TickTime::at(10.0));

    let mut stop = Environment::builder().empty_queue(EmptyQueuePolicy::Stop).build();
    stop.spawn("c", sleeper(2.0)).unwrap();
    let summary = stop.run(RunUntil::Time(TickTime::at(10.0))).unwrap();
    assert_eq!(summary.reason, StopReason::Exhausted);
    assert_eq!(summary.final_time, TickTime::at(2.0));
}

#[test]
fn test_run_into_the_past_rejected() {
    let mut env = Environment::default();
    env.run(RunUntil::Duration(4.0)).unwrap();
    assert!(matches!(
        env.run(RunUntil::Time(TickTime::at(1.0))),
        Err(SimError::NonCausalSchedule { .. })
    ));
    assert!(env.run(RunUntil::Duration(-1.0)).is_err());
}

#[test]
fn test_condition_stops_before_next_step() {
    let mut env = Environment::default();
    env.spawn("clock", process_fn(|cx: &mut Context<'_>| cx.hold(1.0)))
        .unwrap();
    let summary = env
        .run(RunUntil::condition(|env: &Environment| env.now() >= TickTime::at(4.0)))
        .unwrap();
    assert_eq!(summary.reason, StopReason::Condition);
    assert_eq!(summary.final_time, TickTime::at(4.0));
    assert_eq!(summary.events_processed, 5);
}

#[test]
fn test_stop_simulation_resumes_on_next_run() {
    let mut env = Environment::default();
    let mut phase = 0;
    let c = env
        .spawn(
            "stopper",
            process_fn(move |cx: &mut Context<'_>| {
                phase += 1;
                match phase {
                    1 => cx.hold(3.0),
                    2 => cx.stop_simulation(),
                    3 => cx.hold(2.0),
                    _ => cx.terminate(),
                }
            }),
        )
        .unwrap();
    let first = env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(first.reason, StopReason::Stopped);
    assert_eq!(first.final_time, TickTime::at(3.0));
    assert_eq!(env.scheduled_time(c).unwrap(), Some(TickTime::at(3.0)));

    let second = env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(second.reason, StopReason::Exhausted);
    assert_eq!(second.final_time, TickTime::at(5.0));
    assert_eq!(env.component_state(c).unwrap(), ComponentState::Terminated);
}

#[test]
fn test_body_error_aborts_run() {
    let mut env = Environment::default();
    let mut held = false;
    env.spawn(
        "confused",
        process_fn(move |cx: &mut Context<'_>| {
            if !held {
                held = true;
                return cx.hold(5.0);
            }
            cx.hold_with(HoldOptions::until(TickTime::at(2.0)))
        }),
    )
    .unwrap();
    let err = env.run(RunUntil::Quiescent).unwrap_err();
    assert_eq!(
        err,
        SimError::NonCausalSchedule {
            requested: 2.0,
            now: 5.0
        }
    );
    assert_eq!(env.current(), None);
}

// ── Lifecycle ─────────────────────────────────────────────────────────

#[test]
fn test_standby_runs_after_every_event() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let mut env = Environment::default();
    let mut runs = 0;
    let watcher = env
        .spawn(
            "watcher",
            process_fn(move |cx: &mut Context<'_>| {
                runs += 1;
                sink.borrow_mut().push(cx.now().ticks());
                if runs == 4 {
                    return cx.terminate();
                }
                cx.standby()
            }),
        )
        .unwrap();
    let mut holds = 0;
    env.spawn(
        "ticker",
        process_fn(move |cx: &mut Context<'_>| {
            holds += 1;
            if holds > 3 {
                return cx.terminate();
            }
            cx.hold(1.0)
        }),
    )
    .unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(times(&log), vec![0.0, 0.0, 1.0, 2.0]);
    assert_eq!(env.component_state(watcher).unwrap(), ComponentState::Terminated);
}

#[test]
fn test_standby_alone_does_not_spin() {
    let mut env = Environment::default();
    let c = env
        .spawn("idler", process_fn(|cx: &mut Context<'_>| cx.standby()))
        .unwrap();
    let summary = env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(summary.reason, StopReason::Exhausted);
    assert_eq!(env.component_state(c).unwrap(), ComponentState::Standby);
}

#[test]
fn test_passive_component_activated_later() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let mut env = Environment::default();
    let mut woken = false;
    let sleeper_id = env
        .spawn(
            "sleeper",
            process_fn(move |cx: &mut Context<'_>| {
                if woken {
                    sink.borrow_mut().push(cx.now().ticks());
                    return cx.terminate();
                }
                woken = true;
                cx.passivate()
            }),
        )
        .unwrap();
    let mut done = false;
    env.spawn(
        "alarm",
        process_fn(move |cx: &mut Context<'_>| {
            if done {
                cx.activate(sleeper_id, ActivateOptions::new())?;
                return cx.terminate();
            }
            done = true;
            cx.hold(3.0)
        }),
    )
    .unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(times(&log), vec![3.0]);
}

#[test]
fn test_interrupt_extends_hold_by_interruption() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let mut env = Environment::builder().record_trace().build();
    let worker = env
        .spawn("worker", {
            let mut held = false;
            process_fn(move |cx: &mut Context<'_>| {
                if held {
                    sink.borrow_mut().push(cx.now().ticks());
                    return cx.terminate();
                }
                held = true;
                cx.hold(5.0)
            })
        })
        .unwrap();
    let mut phase = 0;
    env.spawn(
        "boss",
        process_fn(move |cx: &mut Context<'_>| {
            phase += 1;
            match phase {
                1 => cx.hold(2.0),
                2 => {
                    cx.interrupt(worker)?;
                    cx.hold(8.0)
                }
                _ => {
                    cx.resume(worker)?;
                    cx.terminate()
                }
            }
        }),
    )
    .unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(times(&log), vec![13.0]);
    assert!(env
        .trace()
        .iter()
        .any(|r| r.kind == TraceKind::Resumed { component: worker }));
}

#[test]
fn test_repeating_process_restarts() {
    let cycles = Rc::new(Cell::new(0u32));
    let counter = cycles.clone();
    let mut env = Environment::default();
    let mut held = false;
    let c = env
        .spawn_repeating(
            "machine",
            process_fn(move |cx: &mut Context<'_>| {
                if held {
                    held = false;
                    counter.set(counter.get() + 1);
                    return cx.terminate();
                }
                held = true;
                cx.hold(2.0)
            }),
        )
        .unwrap();
    env.run(RunUntil::Time(TickTime::at(7.0))).unwrap();
    assert_eq!(cycles.get(), 3);
    assert_eq!(env.component_state(c).unwrap(), ComponentState::Scheduled);
}

#[test]
fn test_cancel_withdraws_request() {
    let mut env = Environment::default();
    let r = env.create_resource(ResourceSpec::new("desk", 1.0)).unwrap();
    env.spawn("holder", served(r, 10.0)).unwrap();
    let c = env.spawn("c", served(r, 1.0)).unwrap();
    env.run(RunUntil::Time(TickTime::at(1.0))).unwrap();
    assert_eq!(env.resource(r).unwrap().requester_count(), 1);

    env.cancel(c).unwrap();
    assert_eq!(env.resource(r).unwrap().requester_count(), 0);
    assert_eq!(env.component_state(c).unwrap(), ComponentState::Terminated);
}

#[test]
fn test_terminate_hands_resource_to_next_requester() {
    let mut env = Environment::default();
    let desk = env.create_resource(ResourceSpec::new("desk", 1.0)).unwrap();
    let holder = env
        .spawn(
            "holder",
            process_fn(move |cx: &mut Context<'_>| {
                let _ = cx.request(Request::new(desk))?;
                cx.terminate()
            }),
        )
        .unwrap();
    let next = env
        .spawn_with("next", served(desk, 2.0), ActivateOptions::new().after(1.0))
        .unwrap();
    env.run(RunUntil::Time(TickTime::at(2.0))).unwrap();
    assert_eq!(env.component_state(holder).unwrap(), ComponentState::Terminated);
    assert_eq!(env.claimed_by(holder, desk).unwrap(), 0.0);
    assert_eq!(env.claimed_by(next, desk).unwrap(), 1.0);
}

#[test]
fn test_terminate_while_requesting_is_rejected() {
    let mut env = Environment::default();
    let desk = env.create_resource(ResourceSpec::new("desk", 1.0)).unwrap();
    env.spawn("holder", served(desk, 10.0)).unwrap();
    let c = env
        .spawn_with(
            "quitter",
            process_fn(move |cx: &mut Context<'_>| {
                let _ = cx.request(Request::new(desk))?;
                cx.terminate()
            }),
            ActivateOptions::new().after(1.0),
        )
        .unwrap();
    let err = env.run(RunUntil::Quiescent).unwrap_err();
    assert_eq!(
        err,
        SimError::InvalidState {
            component: c,
            state: ComponentState::WaitingOnResource,
            action: "terminate",
        }
    );
    assert_eq!(env.resource(desk).unwrap().requester_count(), 1);
    assert_eq!(env.claimed_by(c, desk).unwrap(), 0.0);
}

#[test]
fn test_second_request_while_waiting_is_double_suspension() {
    let mut env = Environment::default();
    let desk = env.create_resource(ResourceSpec::new("desk", 1.0)).unwrap();
    let chair = env.create_resource(ResourceSpec::new("chair", 1.0)).unwrap();
    env.spawn("holder", served(desk, 10.0)).unwrap();
    let c = env
        .spawn_with(
            "greedy",
            process_fn(move |cx: &mut Context<'_>| {
                let _ = cx.request(Request::new(desk))?;
                let _ = cx.request(Request::new(chair))?;
                cx.terminate()
            }),
            ActivateOptions::new().after(1.0),
        )
        .unwrap();
    assert_eq!(
        env.run(RunUntil::Quiescent).unwrap_err(),
        SimError::DoubleSuspension(c)
    );
    assert_eq!(env.resource(chair).unwrap().claimed(), 0.0);
}

#[test]
fn test_verb_after_passivate_is_rejected() {
    let mut env = Environment::default();
    let c = env
        .spawn(
            "twice",
            process_fn(|cx: &mut Context<'_>| {
                let _ = cx.passivate()?;
                cx.hold(1.0)
            }),
        )
        .unwrap();
    assert_eq!(
        env.run(RunUntil::Quiescent).unwrap_err(),
        SimError::InvalidState {
            component: c,
            state: ComponentState::Passive,
            action: "hold",
        }
    );
    assert!(!env.is_scheduled(c));
}

// ── Reneging & waiting ────────────────────────────────────────────────

fn impatient(r: ResourceId, patience: f64, log: Rc<RefCell<Vec<(f64, bool)>>>) -> impl Process {
    let mut asked = false;
    process_fn(move |cx: &mut Context<'_>| {
        if !asked {
            asked = true;
            if let Outcome::Suspended(y) = cx.request(Request::new(r).fail_delay(patience))? {
                return Ok(y);
            }
        }
        log.borrow_mut().push((cx.now().ticks(), cx.failed()));
        cx.terminate()
    })
}

#[test]
fn test_request_reneges_after_patience() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut env = Environment::builder().record_trace().build();
    let r = env.create_resource(ResourceSpec::new("desk", 1.0)).unwrap();
    env.spawn("holder", served(r, 10.0)).unwrap();
    let quick = env
        .spawn_with(
            "quick",
            impatient(r, 3.0, log.clone()),
            ActivateOptions::new().at(TickTime::at(1.0)),
        )
        .unwrap();
    env.spawn_with(
        "patient",
        impatient(r, 20.0, log.clone()),
        ActivateOptions::new().at(TickTime::at(2.0)),
    )
    .unwrap();
    env.run(RunUntil::Quiescent).unwrap();

    assert_eq!(*log.borrow(), vec![(4.0, true), (10.0, false)]);
    assert!(env
        .trace()
        .iter()
        .any(|rec| rec.kind == TraceKind::Reneged { component: quick }));
    assert_eq!(env.resource(r).unwrap().requester_count(), 0);
}

#[test]
fn test_wait_any_all_and_timeout() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut env = Environment::default();
    let door = env.create_state("door", false);
    let light = env.create_state("light", "red");

    let waiter = |wait: Wait, tag: &'static str, log: Rc<RefCell<Vec<(&'static str, f64, bool)>>>| {
        let mut pending = Some(wait);
        process_fn(move |cx: &mut Context<'_>| {
            if let Some(w) = pending.take() {
                if let Outcome::Suspended(y) = cx.wait_for(w)? {
                    return Ok(y);
                }
            }
            log.borrow_mut().push((tag, cx.now().ticks(), cx.failed()));
            cx.terminate()
        })
    };

    env.spawn(
        "any",
        waiter(Wait::from(StateRequest::equals(&door, true)), "any", log.clone()),
    )
    .unwrap();
    env.spawn(
        "all",
        waiter(
            Wait::all([
                StateRequest::equals(&door, true),
                StateRequest::equals(&light, "green"),
            ]),
            "all",
            log.clone(),
        ),
    )
    .unwrap();
    env.spawn(
        "timeout",
        waiter(
            Wait::from(StateRequest::equals(&light, "blue")).fail_delay(2.0),
            "timeout",
            log.clone(),
        ),
    )
    .unwrap();

    let mut phase = 0;
    env.spawn(
        "operator",
        process_fn(move |cx: &mut Context<'_>| {
            phase += 1;
            match phase {
                1 => cx.hold(5.0),
                2 => {
                    cx.set_state(&door, true)?;
                    cx.hold(2.0)
                }
                _ => {
                    cx.set_state(&light, "green")?;
                    cx.terminate()
                }
            }
        }),
    )
    .unwrap();

    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![("timeout", 2.0, true), ("any", 5.0, false), ("all", 7.0, false)]
    );
    assert_eq!(env.waiter_count(&door).unwrap(), 0);
    assert_eq!(env.waiter_count(&light).unwrap(), 0);
}

#[test]
fn test_trigger_wakes_at_most_max() {
    let mut env = Environment::default();
    let flag = env.create_state("flag", false);
    let spawn_waiter = |env: &mut Environment, name: &str| {
        let mut asked = false;
        env.spawn(
            name,
            process_fn(move |cx: &mut Context<'_>| {
                if !asked {
                    asked = true;
                    if let Outcome::Suspended(y) = cx.wait(StateRequest::equals(&flag, true))? {
                        return Ok(y);
                    }
                }
                cx.terminate()
            }),
        )
        .unwrap()
    };
    let first = spawn_waiter(&mut env, "first");
    let second = spawn_waiter(&mut env, "second");
    env.run(RunUntil::Quiescent).unwrap();

    env.trigger(&flag, true, Some(false), Some(1)).unwrap();
    assert_eq!(env.component_state(first).unwrap(), ComponentState::Scheduled);
    assert_eq!(env.component_state(second).unwrap(), ComponentState::WaitingOnState);
    assert!(!env.state_value(&flag).unwrap());
}

// ── Logging ───────────────────────────────────────────────────────────

#[traced_test]
#[test]
fn test_run_logs_lifecycle() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut env = Environment::default();
    let r = env.create_resource(ResourceSpec::new("desk", 1.0)).unwrap();
    env.spawn("holder", served(r, 10.0)).unwrap();
    env.spawn("quick", impatient(r, 1.0, log)).unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    assert!(logs_contain("run started"));
    assert!(logs_contain("request reneged"));
    assert!(logs_contain("run finished"));
}

// ── Properties ────────────────────────────────────────────────────────

/// Every component sits in exactly the structures its state allows.
fn check_single_location(env: &Environment) -> Result<(), TestCaseError> {
    let requesting: Vec<ComponentId> = env
        .resources
        .iter()
        .flat_map(|r| r.requesters().components())
        .collect();
    let waiting: Vec<ComponentId> = env
        .states
        .iter()
        .flat_map(|s| s.waiters().components())
        .collect();
    for c in env.component_ids() {
        let rec = env.record(c).unwrap();
        let in_heap = env.is_scheduled(c);
        let in_standby = env.standby.contains(&c) || env.pending_standby.contains(&c);
        let in_requesters = requesting.contains(&c);
        let in_waiters = waiting.contains(&c);
        match rec.state {
            ComponentState::Scheduled => {
                prop_assert!(in_heap, "{} scheduled without event", c);
                prop_assert!(!in_standby && !in_requesters && !in_waiters);
            }
            ComponentState::WaitingOnResource => {
                prop_assert!(!rec.requests.is_empty() && rec.waits.is_empty());
                prop_assert!(in_requesters && !in_waiters && !in_standby);
            }
            ComponentState::WaitingOnState => {
                prop_assert!(!rec.waits.is_empty() && rec.requests.is_empty());
                prop_assert!(in_waiters && !in_requesters && !in_standby);
            }
            ComponentState::Standby => {
                prop_assert!(in_standby);
                prop_assert!(!in_heap && !in_requesters && !in_waiters);
            }
            ComponentState::Interrupted => prop_assert!(!in_heap && !in_standby),
            ComponentState::Current => prop_assert!(false, "{} current between steps", c),
            ComponentState::Created | ComponentState::Passive | ComponentState::Terminated => {
                prop_assert!(!in_heap && !in_standby && !in_requesters && !in_waiters);
            }
        }
    }
    Ok(())
}

/// Spawn one of six behaviours, picked by `kind`, at `arrival`.
fn spawn_actor(
    env: &mut Environment,
    kind: u8,
    desk: ResourceId,
    light: State<bool>,
    anchor: ComponentId,
    (arrival, d): (f64, f64),
) -> SimResult<ComponentId> {
    let options = ActivateOptions::new().at(TickTime::at(arrival));
    match kind {
        0 => env.spawn_with("Actor.", served(desk, d), options),
        1 => env.spawn_with(
            "Actor.",
            impatient(desk, d, Rc::new(RefCell::new(Vec::new()))),
            options,
        ),
        2 => {
            let mut asked = false;
            env.spawn_with(
                "Actor.",
                process_fn(move |cx: &mut Context<'_>| {
                    if !asked {
                        asked = true;
                        let wait = Wait::from(StateRequest::equals(&light, true)).fail_delay(d);
                        if let Outcome::Suspended(y) = cx.wait_for(wait)? {
                            return Ok(y);
                        }
                    }
                    cx.terminate()
                }),
                options,
            )
        }
        3 => {
            let mut phase = 0;
            env.spawn_with(
                "Actor.",
                process_fn(move |cx: &mut Context<'_>| {
                    phase += 1;
                    match phase {
                        1 => cx.hold(d),
                        2 => {
                            cx.set_state(&light, true)?;
                            cx.hold(1.0)
                        }
                        _ => {
                            cx.set_state(&light, false)?;
                            cx.terminate()
                        }
                    }
                }),
                options,
            )
        }
        4 => {
            let mut runs = 0;
            env.spawn_with(
                "Actor.",
                process_fn(move |cx: &mut Context<'_>| {
                    runs += 1;
                    if runs > 2 {
                        return cx.terminate();
                    }
                    cx.standby()
                }),
                options,
            )
        }
        _ => {
            let mut phase = 0;
            let mut interrupted = false;
            env.spawn_with(
                "Actor.",
                process_fn(move |cx: &mut Context<'_>| {
                    phase += 1;
                    match phase {
                        1 => cx.hold(d),
                        2 => {
                            match cx.interrupt(anchor) {
                                Ok(()) => interrupted = true,
                                Err(SimError::Terminated(_)) => {}
                                Err(e) => return Err(e),
                            }
                            cx.hold(1.0)
                        }
                        _ => {
                            if interrupted {
                                cx.resume(anchor)?;
                            }
                            cx.terminate()
                        }
                    }
                }),
                options,
            )
        }
    }
}

proptest! {
    #[test]
    fn prop_clock_is_monotonic(delays in prop::collection::vec(0u32..50, 1..30)) {
        let mut env = Environment::default();
        for d in &delays {
            env.spawn("Sleeper.", sleeper(*d as f64)).unwrap();
        }
        let mut last = env.now();
        while env.step().unwrap().is_some() {
            prop_assert!(env.now() >= last);
            last = env.now();
        }
        let max = delays.iter().copied().max().unwrap_or(0);
        prop_assert_eq!(env.now(), TickTime::at(max as f64));
    }

    #[test]
    fn prop_queue_conserves_members(ops in prop::collection::vec((any::<bool>(), 0usize..5), 0..60)) {
        let mut env = Environment::default();
        let q = env.create_queue("line", QueueOrder::PriorityFcfs, None);
        let members: Vec<ComponentId> = (0..5).map(|_| env.create_component("c.")).collect();
        for (add, i) in ops {
            let c = members[i];
            if add && !env.queue(q).unwrap().contains(c) {
                env.enqueue(q, c, None).unwrap();
            } else {
                env.dequeue(q, c).unwrap();
            }
            let queue = env.queue(q).unwrap();
            prop_assert_eq!(queue.added() - queue.removed(), queue.len() as u64);
        }
    }

    #[test]
    fn prop_component_has_single_location(
        plan in prop::collection::vec((0u8..6, 0u32..20, 1u32..10), 1..25)
    ) {
        let mut env = Environment::default();
        let desk = env.create_resource(ResourceSpec::new("desk", 1.0)).unwrap();
        let light = env.create_state("light", false);
        let anchor = env.spawn("anchor", served(desk, 5.0)).unwrap();
        for (kind, arrival, d) in plan {
            spawn_actor(&mut env, kind, desk, light, anchor, (arrival as f64, d as f64)).unwrap();
        }
        check_single_location(&env)?;
        while env.step().unwrap().is_some() {
            check_single_location(&env)?;
        }
    }
}
