use proptest::prelude::*;

use super::*;
use crate::component::{ActivateOptions, ComponentState};
use crate::context::Context;
use crate::environment::{Environment, RunUntil};
use crate::priority::Priority;
use crate::process::{process_fn, Outcome, Process};
use crate::trace::TraceKind;

// ── Helpers ───────────────────────────────────────────────────────────

/// Issues `request` once, then passivates holding whatever it got.
fn claimant(request: Request) -> impl Process {
    let mut pending = Some(request);
    process_fn(move |cx: &mut Context<'_>| {
        if let Some(req) = pending.take() {
            if let Outcome::Suspended(y) = cx.request(req)? {
                return Ok(y);
            }
        }
        cx.passivate()
    })
}

/// Takes `quantity` from a depletable resource, then terminates.
fn taker(tank: ResourceId, quantity: f64) -> impl Process {
    let mut asked = false;
    process_fn(move |cx: &mut Context<'_>| {
        if !asked {
            asked = true;
            if let Outcome::Suspended(y) = cx.take(tank, quantity)? {
                return Ok(y);
            }
        }
        cx.terminate()
    })
}

/// Claims `quantity`, holds it for `duration`, releases and terminates.
fn user(r: ResourceId, quantity: f64, duration: f64) -> impl Process {
    let mut phase = 0;
    process_fn(move |cx: &mut Context<'_>| {
        phase += 1;
        match phase {
            1 => {
                if let Outcome::Suspended(y) = cx.request(Request::new(r).quantity(quantity))? {
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

fn at(t: f64) -> ActivateOptions {
    ActivateOptions::new().at(TickTime::at(t))
}

fn claims_of(env: &Environment, r: ResourceId) -> Vec<(ComponentId, f64)> {
    env.trace()
        .iter()
        .filter_map(|rec| match &rec.kind {
            TraceKind::Claimed {
                component,
                resource,
                quantity,
            } if *resource == r => Some((*component, *quantity)),
            _ => None,
        })
        .collect()
}

// ── Regular resources ─────────────────────────────────────────────────

fn head_of_line_setup(policy: HonorPolicy) -> (Environment, ResourceId, [ComponentId; 3]) {
    let mut env = Environment::default();
    let r = env
        .create_resource(ResourceSpec::new("desk", 10.0).policy(policy))
        .unwrap();
    let holder = env.spawn("holder", claimant(Request::new(r).quantity(5.0))).unwrap();
    let big = env.spawn("big", claimant(Request::new(r).quantity(10.0))).unwrap();
    let small = env.spawn("small", claimant(Request::new(r).quantity(3.0))).unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    (env, r, [holder, big, small])
}

#[test]
fn test_strict_fcfs_blocks_behind_head() {
    let (env, r, [holder, big, small]) = head_of_line_setup(HonorPolicy::StrictFcfs);
    assert_eq!(env.claimed_by(holder, r).unwrap(), 5.0);
    assert_eq!(env.component_state(big).unwrap(), ComponentState::WaitingOnResource);
    assert_eq!(env.component_state(small).unwrap(), ComponentState::WaitingOnResource);
    assert_eq!(env.resource(r).unwrap().requesters().components(), vec![big, small]);
}

#[test]
fn test_relaxed_fcfs_lets_smaller_request_pass() {
    let (env, r, [_, big, small]) = head_of_line_setup(HonorPolicy::RelaxedFcfs);
    assert_eq!(env.claimed_by(small, r).unwrap(), 3.0);
    assert_eq!(env.resource(r).unwrap().claimed(), 8.0);
    assert_eq!(env.component_state(big).unwrap(), ComponentState::WaitingOnResource);
}

#[test]
fn test_release_honors_waiting_head() {
    let (mut env, r, [holder, big, small]) = head_of_line_setup(HonorPolicy::StrictFcfs);
    env.release_for(holder, r, None).unwrap();
    assert_eq!(env.claimed_by(big, r).unwrap(), 10.0);
    assert_eq!(env.component_state(big).unwrap(), ComponentState::Scheduled);
    assert_eq!(env.component_state(small).unwrap(), ComponentState::WaitingOnResource);
}

#[test]
fn test_weighted_order_and_scan() {
    let mut env = Environment::default();
    let r = env
        .create_resource(ResourceSpec::new("pool", 10.0).policy(HonorPolicy::WeightedFcfs(0.25)))
        .unwrap();
    env.spawn("holder", user(r, 10.0, 5.0)).unwrap();
    let a = env.spawn_with("a", claimant(Request::new(r).quantity(6.0)), at(1.0)).unwrap();
    let b = env.spawn_with("b", claimant(Request::new(r).quantity(2.0)), at(1.0)).unwrap();
    let c = env.spawn_with("c", claimant(Request::new(r).quantity(4.0)), at(1.0)).unwrap();
    env.run(RunUntil::Time(TickTime::at(2.0))).unwrap();

    // arrival ranks a0 b1 c2, quantity ranks b0 c1 a2
    assert_eq!(env.weighted_order(r, 1.0), vec![a, b, c]);
    assert_eq!(env.weighted_order(r, 0.0), vec![b, c, a]);
    assert_eq!(env.weighted_order(r, 0.5), vec![b, a, c]);
    assert_eq!(env.weighted_order(r, 0.25), vec![b, c, a]);

    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(env.claimed_by(b, r).unwrap(), 2.0);
    assert_eq!(env.claimed_by(c, r).unwrap(), 4.0);
    assert_eq!(env.claimed_by(a, r).unwrap(), 0.0);
    assert_eq!(env.component_state(a).unwrap(), ComponentState::WaitingOnResource);
}

#[test]
fn test_weighted_policy_out_of_range_rejected() {
    let mut env = Environment::default();
    let err = env
        .create_resource(ResourceSpec::new("pool", 1.0).policy(HonorPolicy::WeightedFcfs(1.5)))
        .unwrap_err();
    assert!(matches!(err, SimError::InvalidPolicy(_)));
}

#[test]
fn test_higher_priority_request_queues_first() {
    let mut env = Environment::default();
    let r = env.create_resource(ResourceSpec::new("desk", 1.0)).unwrap();
    env.spawn("holder", user(r, 1.0, 5.0)).unwrap();
    let normal = env.spawn_with("normal", claimant(Request::new(r)), at(1.0)).unwrap();
    let vip = env
        .spawn_with("vip", claimant(Request::new(r).priority(Priority::IMPORTANT)), at(2.0))
        .unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(env.claimed_by(vip, r).unwrap(), 1.0);
    assert_eq!(env.claimed_by(normal, r).unwrap(), 0.0);
}

/// A law firm of 20 lawyers is fully booked at t=0 and frees 4 every
/// 4 ticks from t=20 while six customers queue. Returns customer numbers
/// in the order their claims were honored.
fn regular_claim_order(policy: HonorPolicy) -> Vec<usize> {
    let mut env = Environment::builder().record_trace().build();
    let lawyers = env
        .create_resource(ResourceSpec::new("lawyers", 20.0).policy(policy))
        .unwrap();
    let mut phase = 0;
    env.spawn(
        "manager",
        process_fn(move |cx: &mut Context<'_>| {
            phase += 1;
            match phase {
                1 => {
                    if let Outcome::Suspended(y) = cx.request(Request::new(lawyers).quantity(20.0))? {
                        return Ok(y);
                    }
                    cx.hold(20.0)
                }
                2..=6 => {
                    cx.release_quantity(lawyers, 4.0)?;
                    cx.hold(4.0)
                }
                _ => cx.stop_simulation(),
            }
        }),
    )
    .unwrap();
    let arrivals = [(1.0, 5.0), (6.0, 6.0), (15.0, 3.0), (24.0, 1.0), (30.0, 3.0), (37.0, 2.0)];
    let customers: Vec<ComponentId> = arrivals
        .iter()
        .map(|&(t, q)| {
            env.spawn_with("Customer.", claimant(Request::new(lawyers).quantity(q)), at(t))
                .unwrap()
        })
        .collect();
    env.run(RunUntil::Quiescent).unwrap();

    claims_of(&env, lawyers)
        .into_iter()
        .filter_map(|(c, _)| customers.iter().position(|x| *x == c).map(|i| i + 1))
        .collect()
}

#[test]
fn test_regular_strict_fcfs_claim_order() {
    assert_eq!(regular_claim_order(HonorPolicy::StrictFcfs), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_regular_relaxed_fcfs_claim_order() {
    assert_eq!(regular_claim_order(HonorPolicy::RelaxedFcfs), vec![3, 4, 1, 5, 2, 6]);
}

#[test]
fn test_regular_sqf_claim_order() {
    assert_eq!(regular_claim_order(HonorPolicy::Sqf), vec![3, 4, 1, 5, 2, 6]);
}

#[test]
fn test_regular_weighted_claim_order() {
    assert_eq!(regular_claim_order(HonorPolicy::WeightedFcfs(0.01)), vec![3, 4, 1, 5, 2, 6]);
}

// ── Preemption ────────────────────────────────────────────────────────

#[test]
fn test_preemptive_resource_bumps_lower_priority() {
    let mut env = Environment::builder().record_trace().build();
    let r = env
        .create_resource(ResourceSpec::new("machine", 1.0).preemptive(true))
        .unwrap();
    let low = env.spawn("low", claimant(Request::new(r))).unwrap();
    let high = env
        .spawn_with("high", claimant(Request::new(r).priority(Priority::IMPORTANT)), at(1.0))
        .unwrap();
    env.run(RunUntil::Quiescent).unwrap();

    assert_eq!(env.claimed_by(high, r).unwrap(), 1.0);
    assert_eq!(env.claimed_by(low, r).unwrap(), 0.0);
    assert_eq!(env.component_state(low).unwrap(), ComponentState::Passive);
    assert!(env.trace().iter().any(|rec| rec.kind
        == TraceKind::Bumped {
            component: low,
            resource: r,
            by: high,
        }));
}

#[test]
fn test_equal_priority_does_not_bump() {
    let mut env = Environment::default();
    let r = env
        .create_resource(ResourceSpec::new("machine", 1.0).preemptive(true))
        .unwrap();
    let first = env.spawn("first", claimant(Request::new(r))).unwrap();
    let second = env.spawn_with("second", claimant(Request::new(r)), at(1.0)).unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(env.claimed_by(first, r).unwrap(), 1.0);
    assert_eq!(env.component_state(second).unwrap(), ComponentState::WaitingOnResource);
}

#[test]
fn test_non_preemptive_resource_never_bumps() {
    let mut env = Environment::default();
    let r = env.create_resource(ResourceSpec::new("machine", 1.0)).unwrap();
    let low = env.spawn("low", claimant(Request::new(r))).unwrap();
    let high = env
        .spawn_with("high", claimant(Request::new(r).priority(Priority::CRITICAL)), at(1.0))
        .unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(env.claimed_by(low, r).unwrap(), 1.0);
    assert_eq!(env.component_state(high).unwrap(), ComponentState::WaitingOnResource);
}

// ── Multi-resource requests ───────────────────────────────────────────

#[test]
fn test_one_of_reports_honoring_resource() {
    let mut env = Environment::default();
    let r1 = env.create_resource(ResourceSpec::new("left", 1.0)).unwrap();
    let r2 = env.create_resource(ResourceSpec::new("right", 1.0)).unwrap();
    let holder = env.spawn("holder", claimant(Request::new(r1))).unwrap();
    let c = env.spawn("c", claimant(Request::any_of([r1, r2]))).unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(env.record(c).unwrap().honored_by, Some(r2));
    assert_eq!(env.claimed_by(c, r2).unwrap(), 1.0);

    // both busy: the waiter sits in both queues until one frees up
    let d = env.spawn("d", claimant(Request::any_of([r1, r2]))).unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(env.resource(r1).unwrap().requester_count(), 1);
    assert_eq!(env.resource(r2).unwrap().requester_count(), 1);

    env.release_for(holder, r1, None).unwrap();
    assert_eq!(env.record(d).unwrap().honored_by, Some(r1));
    assert_eq!(env.claimed_by(d, r1).unwrap(), 1.0);
    assert_eq!(env.resource(r2).unwrap().requester_count(), 0);
}

#[test]
fn test_all_of_is_atomic() {
    let mut env = Environment::default();
    let r1 = env.create_resource(ResourceSpec::new("crane", 1.0)).unwrap();
    let r2 = env.create_resource(ResourceSpec::new("truck", 1.0)).unwrap();
    let holder = env.spawn("holder", claimant(Request::new(r2))).unwrap();
    let c = env.spawn("c", claimant(Request::all_of([r1, r2]))).unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(env.claimed_by(c, r1).unwrap(), 0.0);
    assert_eq!(env.resource(r1).unwrap().claimed(), 0.0);

    env.release_for(holder, r2, None).unwrap();
    assert_eq!(env.claimed_by(c, r1).unwrap(), 1.0);
    assert_eq!(env.claimed_by(c, r2).unwrap(), 1.0);
}

#[test]
fn test_duplicate_items_are_merged() {
    let mut env = Environment::default();
    let r = env.create_resource(ResourceSpec::new("pool", 5.0)).unwrap();
    let c = env
        .spawn("c", claimant(Request::new(r).quantity(2.0).and(r, 1.5)))
        .unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(env.claimed_by(c, r).unwrap(), 3.5);
}

// ── Releases ──────────────────────────────────────────────────────────

#[test]
fn test_over_release_is_fatal() {
    let mut env = Environment::default();
    let r = env.create_resource(ResourceSpec::new("pool", 5.0)).unwrap();
    let c = env.spawn("c", claimant(Request::new(r).quantity(2.0))).unwrap();
    env.run(RunUntil::Quiescent).unwrap();

    let err = env.release_for(c, r, Some(3.0)).unwrap_err();
    assert_eq!(
        err,
        SimError::OverRelease {
            component: c,
            resource: r,
            requested: 3.0,
            claimed: 2.0,
        }
    );
    assert!(err.is_fatal());
    assert!(matches!(
        env.release_for(c, r, Some(f64::NAN)),
        Err(SimError::InvalidQuantity { .. })
    ));

    env.release_for(c, r, Some(1.5)).unwrap();
    assert_eq!(env.claimed_by(c, r).unwrap(), 0.5);
    assert_eq!(env.resource(r).unwrap().claimer_count(), 1);
    env.release_for(c, r, None).unwrap();
    assert_eq!(env.resource(r).unwrap().claimer_count(), 0);
    // nothing left: a full release is a no-op
    env.release_for(c, r, None).unwrap();
}

#[test]
fn test_release_resource_frees_every_holder() {
    let mut env = Environment::default();
    let r = env.create_resource(ResourceSpec::new("pool", 2.0)).unwrap();
    let a = env.spawn("a", claimant(Request::new(r))).unwrap();
    let b = env.spawn("b", claimant(Request::new(r))).unwrap();
    let c = env.spawn("c", claimant(Request::new(r))).unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    env.release_resource(r).unwrap();
    assert_eq!(env.claimed_by(a, r).unwrap(), 0.0);
    assert_eq!(env.claimed_by(b, r).unwrap(), 0.0);
    assert_eq!(env.claimed_by(c, r).unwrap(), 1.0);
}

#[test]
fn test_terminate_releases_claims() {
    let mut env = Environment::default();
    let r = env.create_resource(ResourceSpec::new("pool", 1.0)).unwrap();
    let c = env.spawn("c", user(r, 1.0, 3.0)).unwrap();
    let next = env.spawn("next", claimant(Request::new(r))).unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(env.component_state(c).unwrap(), ComponentState::Terminated);
    assert_eq!(env.claimed_by(next, r).unwrap(), 1.0);
    assert_eq!(env.now(), TickTime::at(3.0));
}

// ── Capacity limits ───────────────────────────────────────────────────

#[test]
fn test_oversized_request_errors_by_default() {
    let mut env = Environment::default();
    let r = env.create_resource(ResourceSpec::new("pool", 10.0)).unwrap();
    env.spawn("greedy", claimant(Request::new(r).quantity(12.0))).unwrap();
    assert!(matches!(
        env.run(RunUntil::Quiescent),
        Err(SimError::CapacityLimit { .. })
    ));
    assert_eq!(env.current(), None);
}

#[test]
fn test_cap_mode_truncates_request() {
    let mut env = Environment::default();
    let r = env
        .create_resource(ResourceSpec::new("pool", 10.0).capacity_limit(CapacityLimitMode::Cap))
        .unwrap();
    let c = env.spawn("c", claimant(Request::new(r).quantity(12.0))).unwrap();
    let d = env
        .spawn(
            "d",
            claimant(Request::new(r).quantity(15.0).limit_mode(CapacityLimitMode::Cap)),
        )
        .unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(env.claimed_by(c, r).unwrap(), 10.0);
    assert_eq!(env.requested_by(d, r).unwrap(), 10.0);
}

#[test]
fn test_schedule_mode_waits_for_capacity() {
    let mut env = Environment::default();
    let r = env
        .create_resource(
            ResourceSpec::new("pool", 10.0).capacity_limit(CapacityLimitMode::Schedule),
        )
        .unwrap();
    let c = env.spawn("c", claimant(Request::new(r).quantity(12.0))).unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(env.component_state(c).unwrap(), ComponentState::WaitingOnResource);

    env.set_capacity(r, 12.0).unwrap();
    assert_eq!(env.component_state(c).unwrap(), ComponentState::Scheduled);
    assert_eq!(env.claimed_by(c, r).unwrap(), 12.0);
}

#[test]
fn test_set_capacity_cannot_drop_below_claimed() {
    let mut env = Environment::builder().record_trace().build();
    let r = env.create_resource(ResourceSpec::new("pool", 2.0)).unwrap();
    env.spawn("a", claimant(Request::new(r).quantity(2.0))).unwrap();
    let b = env.spawn("b", claimant(Request::new(r))).unwrap();
    env.run(RunUntil::Quiescent).unwrap();

    assert!(matches!(
        env.set_capacity(r, 1.0),
        Err(SimError::CapacityLimit { .. })
    ));
    env.set_capacity(r, 3.0).unwrap();
    assert_eq!(env.claimed_by(b, r).unwrap(), 1.0);
    assert_eq!(env.resource(r).unwrap().capacity_timeline().current(), 3.0);
    assert!(env.trace().iter().any(|rec| matches!(
        rec.kind,
        TraceKind::CapacityChanged { capacity, .. } if capacity == 3.0
    )));
}

// ── Depletable resources ──────────────────────────────────────────────

/// Six customers take from an initially empty tank of 20 while a refill
/// process puts 4 every 10 ticks from t=20. Returns customer numbers in
/// the order their takes were honored.
fn depletable_take_order(policy: HonorPolicy) -> Vec<usize> {
    let mut env = Environment::builder().record_trace().build();
    let tank = env
        .create_resource(ResourceSpec::new("tank", 20.0).depletable(0.0).policy(policy))
        .unwrap();
    let arrivals = [(1.0, 4.0), (6.0, 5.0), (15.0, 3.0), (24.0, 1.0), (40.0, 3.0), (44.0, 2.0)];
    let customers: Vec<ComponentId> = arrivals
        .iter()
        .map(|&(t, q)| env.spawn_with("Customer.", taker(tank, q), at(t)).unwrap())
        .collect();

    let mut started = false;
    env.spawn(
        "refill",
        process_fn(move |cx: &mut Context<'_>| {
            if !started {
                started = true;
                return cx.hold(20.0);
            }
            match cx.put(tank, 4.0)? {
                Outcome::Suspended(y) => Ok(y),
                Outcome::Ready => cx.hold(10.0),
            }
        }),
    )
    .unwrap();
    env.run(RunUntil::Time(TickTime::at(100.0))).unwrap();

    claims_of(&env, tank)
        .into_iter()
        .filter(|(_, q)| *q > 0.0)
        .filter_map(|(c, _)| customers.iter().position(|x| *x == c).map(|i| i + 1))
        .collect()
}

#[test]
fn test_depletable_relaxed_order() {
    assert_eq!(depletable_take_order(HonorPolicy::RelaxedFcfs), vec![1, 3, 4, 5, 2, 6]);
}

#[test]
fn test_depletable_strict_order() {
    assert_eq!(depletable_take_order(HonorPolicy::StrictFcfs), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_depletable_sqf_order() {
    assert_eq!(depletable_take_order(HonorPolicy::Sqf), vec![3, 4, 1, 5, 6, 2]);
}

#[test]
fn test_put_grants_queued_take() {
    let mut env = Environment::builder().record_trace().build();
    let tank = env
        .create_resource(ResourceSpec::new("tank", 100.0).depletable(10.0))
        .unwrap();
    let thirsty = env.spawn("thirsty", taker(tank, 25.0)).unwrap();
    env.spawn_with(
        "filler",
        process_fn(move |cx: &mut Context<'_>| match cx.put(tank, 20.0)? {
            Outcome::Suspended(y) => Ok(y),
            Outcome::Ready => cx.terminate(),
        }),
        at(1.0),
    )
    .unwrap();
    env.run(RunUntil::Quiescent).unwrap();

    let granted_at: Vec<TickTime> = env
        .trace()
        .iter()
        .filter(|rec| {
            matches!(rec.kind, TraceKind::Claimed { component, .. } if component == thirsty)
        })
        .map(|rec| rec.time)
        .collect();
    assert_eq!(granted_at, vec![TickTime::at(1.0)]);
    assert_eq!(env.resource(tank).unwrap().level(), 5.0);
    assert_eq!(env.component_state(thirsty).unwrap(), ComponentState::Terminated);
}

#[test]
fn test_depletable_level_and_put_truncation() {
    let mut env = Environment::default();
    let tank = env
        .create_resource(
            ResourceSpec::new("tank", 10.0)
                .depletable(8.0)
                .capacity_limit(CapacityLimitMode::Cap),
        )
        .unwrap();
    assert_eq!(env.resource(tank).unwrap().level(), 8.0);
    env.spawn(
        "filler",
        process_fn(move |cx: &mut Context<'_>| {
            match cx.put(tank, 5.0)? {
                Outcome::Suspended(y) => Ok(y),
                Outcome::Ready => cx.terminate(),
            }
        }),
    )
    .unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(env.resource(tank).unwrap().level(), 10.0);
}

#[test]
fn test_take_on_regular_resource_rejected() {
    let mut env = Environment::default();
    let r = env.create_resource(ResourceSpec::new("desk", 1.0)).unwrap();
    env.spawn("c", taker(r, 1.0)).unwrap();
    assert_eq!(env.run(RunUntil::Quiescent).unwrap_err(), SimError::NotDepletable(r));
}

#[test]
fn test_refill_wakes_takers() {
    let mut env = Environment::default();
    let tank = env
        .create_resource(ResourceSpec::new("tank", 10.0).depletable(4.0))
        .unwrap();
    let c = env.spawn("c", taker(tank, 6.0)).unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    assert_eq!(env.component_state(c).unwrap(), ComponentState::WaitingOnResource);

    env.refill(tank, 3.0).unwrap();
    assert_eq!(env.resource(tank).unwrap().level(), 1.0);
    assert_eq!(env.component_state(c).unwrap(), ComponentState::Scheduled);

    assert!(matches!(
        env.refill(tank, 10.0),
        Err(SimError::CapacityLimit { .. })
    ));
    assert!(matches!(
        env.refill(tank, 0.0),
        Err(SimError::InvalidQuantity { .. })
    ));
    let desk = env.create_resource(ResourceSpec::new("desk", 1.0)).unwrap();
    assert_eq!(env.refill(desk, 1.0), Err(SimError::NotDepletable(desk)));
}

#[test]
fn test_refill_cap_mode_truncates() {
    let mut env = Environment::default();
    let tank = env
        .create_resource(
            ResourceSpec::new("tank", 10.0)
                .depletable(7.0)
                .capacity_limit(CapacityLimitMode::Cap),
        )
        .unwrap();
    env.refill(tank, 5.0).unwrap();
    assert_eq!(env.resource(tank).unwrap().level(), 10.0);
}

#[test]
fn test_depletable_capacity_change_keeps_level() {
    let mut env = Environment::default();
    let tank = env
        .create_resource(ResourceSpec::new("tank", 10.0).depletable(4.0))
        .unwrap();
    env.set_capacity(tank, 20.0).unwrap();
    let res = env.resource(tank).unwrap();
    assert_eq!(res.level(), 4.0);
    assert_eq!(res.claimed(), 16.0);
    assert!(matches!(
        env.set_capacity(tank, 3.0),
        Err(SimError::CapacityLimit { .. })
    ));
}

#[test]
fn test_invalid_initial_level() {
    let mut env = Environment::default();
    assert!(env
        .create_resource(ResourceSpec::new("tank", 10.0).depletable(11.0))
        .is_err());
    assert!(env.create_resource(ResourceSpec::new("neg", -1.0)).is_err());
}

// ── Selection ─────────────────────────────────────────────────────────

#[test]
fn test_select_resource_policies() {
    let mut env = Environment::default();
    let r1 = env.create_resource(ResourceSpec::new("one", 1.0)).unwrap();
    let r2 = env.create_resource(ResourceSpec::new("two", 2.0)).unwrap();
    let r3 = env.create_resource(ResourceSpec::new("three", 1.0)).unwrap();
    env.spawn("holder", claimant(Request::new(r1))).unwrap();
    env.spawn("waiter", claimant(Request::new(r1))).unwrap();
    env.run(RunUntil::Quiescent).unwrap();
    let all = [r1, r2, r3];

    let pick = |env: &mut Environment, q: f64, p: SelectionPolicy| {
        env.select_resource(&all, q, p).unwrap()
    };
    assert_eq!(pick(&mut env, 1.0, SelectionPolicy::ShortestQueue), Some(r2));
    assert_eq!(pick(&mut env, 1.0, SelectionPolicy::FirstAvailable), Some(r2));
    assert_eq!(pick(&mut env, 3.0, SelectionPolicy::FirstAvailable), None);
    assert_eq!(pick(&mut env, 2.0, SelectionPolicy::RandomAvailable), Some(r2));
    assert!(all.contains(&pick(&mut env, 1.0, SelectionPolicy::RandomOrder).unwrap()));

    let turns: Vec<_> = (0..4)
        .map(|_| pick(&mut env, 1.0, SelectionPolicy::RoundRobin))
        .collect();
    assert_eq!(turns, vec![Some(r1), Some(r2), Some(r3), Some(r1)]);
    assert_eq!(env.select_resource(&[], 1.0, SelectionPolicy::FirstAvailable), Ok(None));
}

#[test]
fn test_statistics_snapshot() {
    let mut env = Environment::default();
    let r = env.create_resource(ResourceSpec::new("pool", 2.0)).unwrap();
    env.spawn("a", user(r, 2.0, 4.0)).unwrap();
    env.run(RunUntil::Time(TickTime::at(8.0))).unwrap();
    let stats = env.resource_statistics(r).unwrap();
    assert_eq!(stats.name, "pool");
    assert_eq!(stats.claimed.current, 0.0);
    assert_eq!(stats.claimed.max, 2.0);
    assert!((stats.claimed.mean - 1.0).abs() < 1e-9);
    assert_eq!(stats.claimers.added, 1);
}

// ── Properties ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn prop_claims_stay_within_capacity(
        capacity in 1u32..6,
        policy in 0usize..3,
        jobs in prop::collection::vec((1u32..8, 1u32..10, 0u32..20), 1..20),
    ) {
        let policy = [HonorPolicy::StrictFcfs, HonorPolicy::RelaxedFcfs, HonorPolicy::Sqf][policy];
        let mut env = Environment::default();
        let r = env
            .create_resource(
                ResourceSpec::new("pool", capacity as f64)
                    .policy(policy)
                    .capacity_limit(CapacityLimitMode::Cap),
            )
            .unwrap();
        let ids: Vec<ComponentId> = jobs
            .iter()
            .map(|&(q, d, t)| {
                env.spawn_with("Job.", user(r, q as f64, d as f64), at(t as f64))
                    .unwrap()
            })
            .collect();

        while env.step().unwrap().is_some() {
            let res = env.resource(r).unwrap();
            prop_assert!(res.claimed() >= 0.0);
            prop_assert!(res.claimed() <= res.capacity() + EPS);
        }
        prop_assert_eq!(env.resource(r).unwrap().claimed(), 0.0);
        for id in ids {
            prop_assert_eq!(env.component_state(id).unwrap(), ComponentState::Terminated);
        }
    }
}
