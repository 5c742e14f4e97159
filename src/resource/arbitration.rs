//! Granting, releasing and re-scanning requests.
//!
//! A request is granted when every resource it names (or, for `one_of`,
//! the first in listed order) can honor it: the quantity fits and the
//! honor policy admits the requester. Head-of-line policies admit only
//! the front of the requester queue; on depletable resources the front
//! is taken per direction, so puts never wait behind takes.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::component::{ActivateOptions, ComponentState};
use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::id::{ComponentId, ResourceId};
use crate::priority::Priority;
use crate::process::{Outcome, Suspension, Yield};
use crate::trace::TraceKind;

use super::{CapacityLimitMode, FailAfter, HonorPolicy, Request, ResourceKind, SelectionPolicy, EPS};

// ── Requesting ────────────────────────────────────────────────────────

impl Environment {
    /// Issue `request` on behalf of the current component `id`.
    pub(crate) fn request_current(&mut self, id: ComponentId, request: Request) -> SimResult<Outcome> {
        let rec = self.record(id)?;
        if !rec.requests.is_empty() || !rec.waits.is_empty() {
            return Err(SimError::DoubleSuspension(id));
        }
        let Request {
            items,
            priority,
            one_of,
            fail,
            fail_priority,
            limit_mode,
        } = request;

        let mut merged: IndexMap<ResourceId, f64> = IndexMap::new();
        for (r, q) in items {
            let res = self.resource(r)?;
            if !q.is_finite() || q == 0.0 || (q < 0.0 && !res.is_depletable()) {
                return Err(SimError::InvalidQuantity {
                    resource: r,
                    quantity: q,
                });
            }
            *merged.entry(r).or_insert(0.0) += q;
        }
        for (r, q) in merged.iter_mut() {
            *q = self.apply_limit(*r, *q, limit_mode)?;
        }

        let now = self.now;
        let fail_at = match fail {
            Some(FailAfter::Delay(d)) => Some(now.plus(d)?),
            Some(FailAfter::At(t)) if t < now => {
                return Err(SimError::NonCausalSchedule {
                    requested: t.ticks(),
                    now: now.ticks(),
                })
            }
            Some(FailAfter::At(t)) => Some(t),
            None => None,
        };

        let rec = self.record_mut(id)?;
        rec.failed = false;
        rec.honored_by = None;
        if merged.is_empty() {
            return Ok(Outcome::Ready);
        }

        let priority = priority.unwrap_or_default();
        for (&r, &q) in merged.iter() {
            if q > 0.0 {
                self.bump(id, r, q, priority)?;
            }
        }
        for (&r, &q) in merged.iter() {
            self.resource_mut(r)?
                .requesters
                .add_keyed(id, Some(priority), q.abs(), now)?;
            self.publish(TraceKind::Requested {
                component: id,
                resource: r,
                quantity: q,
            });
        }
        let rec = self.record_mut(id)?;
        rec.requests = merged;
        rec.request_priority = priority;
        rec.one_of = one_of;

        if self.try_request(id)? {
            return Ok(Outcome::Ready);
        }
        match fail_at {
            Some(at) => {
                self.reschedule(id, at, fail_priority, false, ComponentState::WaitingOnResource)?
            }
            None => self.transition(id, ComponentState::WaitingOnResource)?,
        }
        Ok(Outcome::Suspended(Yield::new(Suspension::Request)))
    }

    /// Adjust `quantity` to the resource's capacity-limit mode.
    fn apply_limit(
        &self,
        r: ResourceId,
        quantity: f64,
        mode: Option<CapacityLimitMode>,
    ) -> SimResult<f64> {
        let res = self.resource(r)?;
        let mode = mode.unwrap_or(res.limit_mode);
        if quantity > 0.0 && quantity > res.capacity + EPS {
            return match mode {
                CapacityLimitMode::Error => Err(SimError::CapacityLimit {
                    resource: r,
                    reason: format!("request of {} exceeds capacity {}", quantity, res.capacity),
                }),
                CapacityLimitMode::Cap => {
                    warn!(resource = %r, quantity, capacity = res.capacity, "request truncated to capacity");
                    Ok(res.capacity)
                }
                CapacityLimitMode::Schedule => Ok(quantity),
            };
        }
        if quantity < 0.0 {
            let room = res.claimed;
            match mode {
                CapacityLimitMode::Error if -quantity > res.capacity + EPS => {
                    return Err(SimError::CapacityLimit {
                        resource: r,
                        reason: format!("put of {} exceeds capacity {}", -quantity, res.capacity),
                    })
                }
                CapacityLimitMode::Cap if -quantity > room + EPS => {
                    warn!(resource = %r, quantity = -quantity, room, "put truncated to free room");
                    return Ok(-room);
                }
                _ => {}
            }
        }
        Ok(quantity)
    }

    /// Grant the pending request of `id` if it can be honored now.
    pub(crate) fn try_request(&mut self, id: ComponentId) -> SimResult<bool> {
        let rec = self.record(id)?;
        if rec.state == ComponentState::Interrupted || rec.requests.is_empty() {
            return Ok(false);
        }
        let items: Vec<(ResourceId, f64)> = rec.requests.iter().map(|(r, q)| (*r, *q)).collect();
        let one_of = rec.one_of;

        let granted = if one_of {
            match items.iter().find(|(r, q)| self.admits(id, *r, *q)) {
                Some(&item) => vec![item],
                None => return Ok(false),
            }
        } else {
            if !items.iter().all(|(r, q)| self.admits(id, *r, *q)) {
                return Ok(false);
            }
            items.clone()
        };
        self.grant(id, &granted, one_of)?;

        // Queues `id` left without a grant may have a new head.
        for (r, _) in items {
            if !granted.iter().any(|(g, _)| *g == r) {
                self.honor_scan(r)?;
            }
        }
        Ok(true)
    }

    fn admits(&self, id: ComponentId, r: ResourceId, quantity: f64) -> bool {
        let Some(res) = self.resources.get(r.index()) else {
            return false;
        };
        res.fits(quantity) && (!res.policy.is_head_of_line() || self.is_head(r, id, quantity))
    }

    /// Whether `id` is the first requester of `r` going in the same
    /// direction (take or put) as `quantity`.
    fn is_head(&self, r: ResourceId, id: ComponentId, quantity: f64) -> bool {
        self.head(r, quantity > 0.0) == Some(id)
    }

    fn head(&self, r: ResourceId, take: bool) -> Option<ComponentId> {
        let res = self.resources.get(r.index())?;
        res.requesters
            .iter()
            .find(|e| {
                self.components
                    .get(e.component.index())
                    .and_then(|c| c.requests.get(&r))
                    .is_some_and(|q| (*q > 0.0) == take)
            })
            .map(|e| e.component)
    }

    fn grant(&mut self, id: ComponentId, granted: &[(ResourceId, f64)], one_of: bool) -> SimResult<()> {
        let now = self.now;
        let priority = self.record(id)?.request_priority;
        for &(r, q) in granted {
            let res = self.resource_mut(r)?;
            let claimed = res.claimed + q;
            res.set_claimed(claimed, now);
            if res.kind == ResourceKind::Regular {
                if !res.claimers.contains(id) {
                    res.claimers.add(id, Some(priority), now)?;
                }
                *self.record_mut(id)?.claims.entry(r).or_insert(0.0) += q;
            }
            debug!(component = %id, resource = %r, quantity = q, %now, "request honored");
            self.publish(TraceKind::Claimed {
                component: id,
                resource: r,
                quantity: q,
            });
        }

        let rec = self.record_mut(id)?;
        if one_of {
            rec.honored_by = granted.first().map(|(r, _)| *r);
        }
        let left: Vec<ResourceId> = rec.requests.keys().copied().collect();
        rec.requests.clear();
        rec.one_of = false;
        for r in left {
            self.resource_mut(r)?.requesters.remove(id, now);
        }

        if self.current != Some(id) {
            self.reschedule(id, now, Priority::NORMAL, false, ComponentState::Scheduled)?;
        }

        // A put can unblock takes and vice versa.
        for &(r, _) in granted {
            if self.resource(r)?.is_depletable() {
                self.honor_scan(r)?;
            }
        }
        Ok(())
    }

    /// Offer `r` to its requesters according to its honor policy.
    pub(crate) fn honor_scan(&mut self, r: ResourceId) -> SimResult<()> {
        let policy = self.resource(r)?.policy;
        match policy {
            HonorPolicy::StrictFcfs | HonorPolicy::Sqf => loop {
                let heads = [self.head(r, true), self.head(r, false)];
                let mut progressed = false;
                for c in heads.into_iter().flatten() {
                    if self.try_request(c)? {
                        progressed = true;
                        break;
                    }
                }
                if !progressed {
                    return Ok(());
                }
            },
            HonorPolicy::RelaxedFcfs => {
                let order = self.resource(r)?.requesters.components();
                self.scan_in_order(r, order)
            }
            HonorPolicy::WeightedFcfs(alpha) => {
                let order = self.weighted_order(r, alpha);
                self.scan_in_order(r, order)
            }
        }
    }

    fn scan_in_order(&mut self, r: ResourceId, order: Vec<ComponentId>) -> SimResult<()> {
        for c in order {
            if self.resource(r)?.requesters.contains(c) {
                self.try_request(c)?;
            }
        }
        Ok(())
    }

    /// Requesters of the top priority class sorted by
    /// `alpha * arrival_rank + (1 - alpha) * quantity_rank`, followed by
    /// the lower classes in queue order.
    pub(crate) fn weighted_order(&self, r: ResourceId, alpha: f64) -> Vec<ComponentId> {
        let Some(res) = self.resources.get(r.index()) else {
            return Vec::new();
        };
        let entries: Vec<_> = res.requesters.iter().collect();
        let Some(top) = entries.first().map(|e| e.priority) else {
            return Vec::new();
        };
        let split = entries
            .iter()
            .position(|e| e.priority != top)
            .unwrap_or(entries.len());
        let (class, rest) = entries.split_at(split);

        let quantity = |c: ComponentId| {
            self.components
                .get(c.index())
                .and_then(|rec| rec.requests.get(&r))
                .map_or(0.0, |q| q.abs())
        };
        let mut by_quantity: Vec<usize> = (0..class.len()).collect();
        by_quantity.sort_by(|a, b| {
            quantity(class[*a].component)
                .total_cmp(&quantity(class[*b].component))
                .then(a.cmp(b))
        });
        let mut quantity_rank = vec![0usize; class.len()];
        for (rank, &i) in by_quantity.iter().enumerate() {
            quantity_rank[i] = rank;
        }

        let mut scored: Vec<(f64, usize)> = (0..class.len())
            .map(|i| (alpha * i as f64 + (1.0 - alpha) * quantity_rank[i] as f64, i))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        scored
            .into_iter()
            .map(|(_, i)| class[i].component)
            .chain(rest.iter().map(|e| e.component))
            .collect()
    }

    /// Bump lower-priority claimers of a preemptive resource, lowest
    /// first, if that frees enough for `quantity`.
    fn bump(&mut self, id: ComponentId, r: ResourceId, quantity: f64, priority: Priority) -> SimResult<()> {
        let res = self.resource(r)?;
        if !res.preemptive || res.kind != ResourceKind::Regular {
            return Ok(());
        }
        let mut available = res.available();
        let mut victims = Vec::new();
        for entry in res.claimers.iter().rev() {
            if available >= quantity - EPS || priority <= entry.priority {
                break;
            }
            available += self
                .components
                .get(entry.component.index())
                .and_then(|c| c.claims.get(&r))
                .copied()
                .unwrap_or(0.0);
            victims.push(entry.component);
        }
        if available < quantity - EPS {
            return Ok(());
        }
        for victim in victims {
            self.release_claim(victim, r, None, false)?;
            debug!(component = %victim, resource = %r, by = %id, "claimer bumped");
            self.publish(TraceKind::Bumped {
                component: victim,
                resource: r,
                by: id,
            });
            let state = self.record(victim)?.state;
            match state {
                ComponentState::Interrupted | ComponentState::Terminated | ComponentState::Current => {}
                _ => self.activate(victim, ActivateOptions::new())?,
            }
        }
        Ok(())
    }

    /// Take `id` out of every requester queue. Returns the resources it
    /// left so the caller can re-scan them.
    pub(crate) fn withdraw_requests(&mut self, id: ComponentId) -> SimResult<Vec<ResourceId>> {
        let now = self.now;
        let rec = self.record_mut(id)?;
        let left: Vec<ResourceId> = rec.requests.keys().copied().collect();
        rec.requests.clear();
        rec.one_of = false;
        for &r in &left {
            self.resource_mut(r)?.requesters.remove(id, now);
        }
        Ok(left)
    }

    /// A request timed out: withdraw it and flag the failure.
    pub(crate) fn renege_request(&mut self, id: ComponentId) -> SimResult<()> {
        let left = self.withdraw_requests(id)?;
        self.record_mut(id)?.failed = true;
        debug!(component = %id, now = %self.now, "request reneged");
        self.publish(TraceKind::Reneged { component: id });
        for r in left {
            self.honor_scan(r)?;
        }
        Ok(())
    }
}

// ── Releasing ─────────────────────────────────────────────────────────

impl Environment {
    /// Release `quantity` (or the whole claim) of `r` held by `id`.
    pub(crate) fn release_claim(
        &mut self,
        id: ComponentId,
        r: ResourceId,
        quantity: Option<f64>,
        scan: bool,
    ) -> SimResult<()> {
        self.resource(r)?;
        let held = self.record(id)?.claims.get(&r).copied().unwrap_or(0.0);
        let q = match quantity {
            None if held <= 0.0 => return Ok(()),
            None => held,
            Some(q) if !q.is_finite() || q <= 0.0 => {
                return Err(SimError::InvalidQuantity {
                    resource: r,
                    quantity: q,
                })
            }
            Some(q) if q > held + EPS => {
                return Err(SimError::OverRelease {
                    component: id,
                    resource: r,
                    requested: q,
                    claimed: held,
                })
            }
            Some(q) => q.min(held),
        };

        let now = self.now;
        let res = self.resource_mut(r)?;
        let claimed = (res.claimed - q).max(0.0);
        res.set_claimed(claimed, now);
        let left = held - q;
        if left <= EPS {
            res.claimers.remove(id, now);
            self.record_mut(id)?.claims.shift_remove(&r);
        } else {
            self.record_mut(id)?.claims.insert(r, left);
        }
        debug!(component = %id, resource = %r, quantity = q, %now, "claim released");
        self.publish(TraceKind::Released {
            component: Some(id),
            resource: r,
            quantity: q,
        });
        if scan {
            self.honor_scan(r)?;
        }
        Ok(())
    }

    pub(crate) fn release_all_claims(&mut self, id: ComponentId) -> SimResult<()> {
        let held: Vec<ResourceId> = self.record(id)?.claims.keys().copied().collect();
        for r in held {
            self.release_claim(id, r, None, true)?;
        }
        Ok(())
    }

    /// Release every claim on `r`, whoever holds it.
    pub fn release_resource(&mut self, r: ResourceId) -> SimResult<()> {
        let holders = self.resource(r)?.claimers.components();
        for c in holders {
            self.release_claim(c, r, None, false)?;
        }
        self.honor_scan(r)
    }

    /// Release `r` on behalf of `component`, which need not be current.
    pub fn release_for(&mut self, component: ComponentId, r: ResourceId, quantity: Option<f64>) -> SimResult<()> {
        self.release_claim(component, r, quantity, true)
    }

    /// Change the capacity of `r` and re-scan its requesters.
    ///
    /// A regular resource cannot shrink below what is claimed. A
    /// depletable resource keeps its level and cannot shrink below it.
    pub fn set_capacity(&mut self, r: ResourceId, capacity: f64) -> SimResult<()> {
        if !capacity.is_finite() || capacity < 0.0 {
            return Err(SimError::InvalidQuantity {
                resource: r,
                quantity: capacity,
            });
        }
        let now = self.now;
        let res = self.resource_mut(r)?;
        match res.kind {
            ResourceKind::Regular => {
                if capacity < res.claimed - EPS {
                    return Err(SimError::CapacityLimit {
                        resource: r,
                        reason: format!("capacity {} below claimed {}", capacity, res.claimed),
                    });
                }
            }
            ResourceKind::Depletable => {
                let level = res.level();
                if capacity < level - EPS {
                    return Err(SimError::CapacityLimit {
                        resource: r,
                        reason: format!("capacity {} below level {}", capacity, level),
                    });
                }
                res.set_claimed((capacity - level).max(0.0), now);
            }
        }
        res.capacity = capacity;
        res.capacity_timeline.record(now, capacity);
        debug!(resource = %r, capacity, %now, "capacity changed");
        self.publish(TraceKind::CapacityChanged {
            resource: r,
            capacity,
        });
        self.honor_scan(r)
    }

    /// Put `quantity` into a depletable resource without suspending
    /// anyone. Overflow follows the resource's limit mode; `Schedule`
    /// behaves as `Error` here since there is nobody to queue.
    pub fn refill(&mut self, r: ResourceId, quantity: f64) -> SimResult<()> {
        let now = self.now;
        let res = self.resource_mut(r)?;
        if !res.is_depletable() {
            return Err(SimError::NotDepletable(r));
        }
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(SimError::InvalidQuantity {
                resource: r,
                quantity,
            });
        }
        let room = res.claimed;
        let q = if quantity > room + EPS {
            match res.limit_mode {
                CapacityLimitMode::Cap => {
                    warn!(resource = %r, quantity, room, "refill truncated to free room");
                    room
                }
                _ => {
                    return Err(SimError::CapacityLimit {
                        resource: r,
                        reason: format!("refill of {} exceeds free room {}", quantity, room),
                    })
                }
            }
        } else {
            quantity.min(room)
        };
        res.set_claimed((room - q).max(0.0), now);
        debug!(resource = %r, quantity = q, %now, "refilled");
        self.publish(TraceKind::Released {
            component: None,
            resource: r,
            quantity: q,
        });
        self.honor_scan(r)
    }
}

// ── Selection ─────────────────────────────────────────────────────────

impl Environment {
    /// Pick one of `resources` for a request of `quantity`.
    ///
    /// Returns `None` for an empty set, or when an availability-based
    /// policy finds nothing with enough room.
    pub fn select_resource(
        &mut self,
        resources: &[ResourceId],
        quantity: f64,
        policy: SelectionPolicy,
    ) -> SimResult<Option<ResourceId>> {
        if resources.is_empty() {
            return Ok(None);
        }
        let mut available = Vec::with_capacity(resources.len());
        for &r in resources {
            if self.resource(r)?.available() >= quantity - EPS {
                available.push(r);
            }
        }
        let picked = match policy {
            SelectionPolicy::ShortestQueue => {
                let mut best = resources[0];
                let mut best_len = self.resource(best)?.requester_count();
                for &r in &resources[1..] {
                    let len = self.resource(r)?.requester_count();
                    if len < best_len {
                        best = r;
                        best_len = len;
                    }
                }
                Some(best)
            }
            SelectionPolicy::FirstAvailable => available.first().copied(),
            SelectionPolicy::RandomOrder => Some(resources[self.sampler.index(resources.len())]),
            SelectionPolicy::RandomAvailable => {
                if available.is_empty() {
                    None
                } else {
                    Some(available[self.sampler.index(available.len())])
                }
            }
            SelectionPolicy::RoundRobin => {
                let cursor = self.round_robin.entry(resources.to_vec()).or_insert(0);
                let r = resources[*cursor % resources.len()];
                *cursor += 1;
                Some(r)
            }
        };
        Ok(picked)
    }
}
