//! The mixin library modifiers are assembled from.
//!
//! Each mixin owns one slice of behavior and the teardown for it. A card
//! effect is usually one modifier with one or two mixins: an interceptor
//! mixin for a stat change, a game-event mixin for a trigger, a dying-wish
//! mixin for a death payload.

use std::cell::Cell;
use std::rc::Rc;

use crate::core::session::Session;
use crate::events::{event_names, EventPattern, GameEvent, SubscriptionId};
use crate::interceptor::{FlagInterceptor, FlagKey, StatInterceptor, StatKey};
use crate::modifier::{ModifierContext, ModifierMixin};

/// How long an interceptor mixin stays registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModifierDuration {
    /// Until the modifier is removed.
    Forever,
    /// For this many starts of the owning player's turn; then the whole
    /// modifier detaches.
    Turns(u32),
}

/// One-shot effect that fires when the modifier is first applied.
///
/// This is the "when played from hand" trigger: modifiers attach at play
/// time, so first application is the play. The effect reads its followup
/// targets off the entity's card through the session.
pub struct OpeningGambitMixin {
    effect: Rc<dyn Fn(&mut Session, &ModifierContext)>,
    fired: bool,
}

impl OpeningGambitMixin {
    pub fn new(effect: impl Fn(&mut Session, &ModifierContext) + 'static) -> Self {
        Self {
            effect: Rc::new(effect),
            fired: false,
        }
    }
}

impl ModifierMixin for OpeningGambitMixin {
    fn on_applied(&mut self, session: &mut Session, ctx: &ModifierContext) {
        if self.fired {
            return;
        }
        self.fired = true;
        (self.effect)(session, ctx);
    }
}

/// Effect that fires when the carrying entity is destroyed.
///
/// Subscribes to the destruction event on apply; the event carries the point
/// where the entity stood, which is the payload most dying wishes need. Fires
/// at most once even if destruction is somehow announced twice.
pub struct DyingWishMixin {
    handler: Rc<dyn Fn(&mut Session, &GameEvent, &ModifierContext)>,
    fired: Rc<Cell<bool>>,
    subscription: Rc<Cell<Option<SubscriptionId>>>,
}

impl DyingWishMixin {
    pub fn new(handler: impl Fn(&mut Session, &GameEvent, &ModifierContext) + 'static) -> Self {
        Self {
            handler: Rc::new(handler),
            fired: Rc::new(Cell::new(false)),
            subscription: Rc::new(Cell::new(None)),
        }
    }
}

impl ModifierMixin for DyingWishMixin {
    fn on_applied(&mut self, session: &mut Session, ctx: &ModifierContext) {
        let handler = self.handler.clone();
        let fired = self.fired.clone();
        let ctx = ctx.clone();
        let id = session.subscribe(
            EventPattern::exact(event_names::DESTROYED),
            Rc::new(move |session, event| {
                if event.entity != Some(ctx.entity) || fired.get() {
                    return;
                }
                fired.set(true);
                handler(session, event, &ctx);
            }),
        );
        self.subscription.set(Some(id));
    }

    fn on_removed(&mut self, session: &mut Session, _ctx: &ModifierContext) {
        if let Some(id) = self.subscription.take() {
            session.unsubscribe(id);
        }
    }
}

/// Generic bus trigger: run a handler whenever a named event is emitted,
/// for as long as the modifier is attached.
pub struct GameEventMixin {
    event_name: String,
    handler: Rc<dyn Fn(&mut Session, &GameEvent, &ModifierContext)>,
    subscription: Rc<Cell<Option<SubscriptionId>>>,
}

impl GameEventMixin {
    pub fn new(
        event_name: impl Into<String>,
        handler: impl Fn(&mut Session, &GameEvent, &ModifierContext) + 'static,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            handler: Rc::new(handler),
            subscription: Rc::new(Cell::new(None)),
        }
    }
}

impl ModifierMixin for GameEventMixin {
    fn on_applied(&mut self, session: &mut Session, ctx: &ModifierContext) {
        let handler = self.handler.clone();
        let ctx = ctx.clone();
        let id = session.subscribe(
            EventPattern::exact(self.event_name.clone()),
            Rc::new(move |session, event| handler(session, event, &ctx)),
        );
        self.subscription.set(Some(id));
    }

    fn on_removed(&mut self, session: &mut Session, _ctx: &ModifierContext) {
        if let Some(id) = self.subscription.take() {
            session.unsubscribe(id);
        }
    }
}

/// Registers a numeric interceptor on the carrying entity for the mixin's
/// lifetime (or a turn-limited window).
///
/// The interceptor is built by a factory so it can capture the live context,
/// in particular the [`crate::modifier::StackCount`] handle: a stack-scaled
/// buff reads `ctx.stacks.get()` inside the closure and every fold sees the
/// current count.
pub struct StatInterceptorMixin {
    key: StatKey,
    priority: i32,
    duration: ModifierDuration,
    make: Rc<dyn Fn(&ModifierContext) -> StatInterceptor>,
    registered: Option<StatInterceptor>,
    turn_subscription: Rc<Cell<Option<SubscriptionId>>>,
}

impl StatInterceptorMixin {
    pub fn new(
        key: StatKey,
        priority: i32,
        duration: ModifierDuration,
        make: impl Fn(&ModifierContext) -> StatInterceptor + 'static,
    ) -> Self {
        Self {
            key,
            priority,
            duration,
            make: Rc::new(make),
            registered: None,
            turn_subscription: Rc::new(Cell::new(None)),
        }
    }
}

impl ModifierMixin for StatInterceptorMixin {
    fn on_applied(&mut self, session: &mut Session, ctx: &ModifierContext) {
        let func = (self.make)(ctx);
        session.add_stat_interceptor(ctx.entity, self.key, func.clone(), self.priority);
        self.registered = Some(func);
        if let ModifierDuration::Turns(turns) = self.duration {
            subscribe_turn_countdown(session, ctx, turns, &self.turn_subscription);
        }
    }

    fn on_removed(&mut self, session: &mut Session, ctx: &ModifierContext) {
        if let Some(func) = self.registered.take() {
            session.remove_stat_interceptor(ctx.entity, self.key, &func);
        }
        if let Some(id) = self.turn_subscription.take() {
            session.unsubscribe(id);
        }
    }
}

/// Permission twin of [`StatInterceptorMixin`].
pub struct FlagInterceptorMixin {
    key: FlagKey,
    priority: i32,
    duration: ModifierDuration,
    make: Rc<dyn Fn(&ModifierContext) -> FlagInterceptor>,
    registered: Option<FlagInterceptor>,
    turn_subscription: Rc<Cell<Option<SubscriptionId>>>,
}

impl FlagInterceptorMixin {
    pub fn new(
        key: FlagKey,
        priority: i32,
        duration: ModifierDuration,
        make: impl Fn(&ModifierContext) -> FlagInterceptor + 'static,
    ) -> Self {
        Self {
            key,
            priority,
            duration,
            make: Rc::new(make),
            registered: None,
            turn_subscription: Rc::new(Cell::new(None)),
        }
    }
}

impl ModifierMixin for FlagInterceptorMixin {
    fn on_applied(&mut self, session: &mut Session, ctx: &ModifierContext) {
        let func = (self.make)(ctx);
        session.add_flag_interceptor(ctx.entity, self.key, func.clone(), self.priority);
        self.registered = Some(func);
        if let ModifierDuration::Turns(turns) = self.duration {
            subscribe_turn_countdown(session, ctx, turns, &self.turn_subscription);
        }
    }

    fn on_removed(&mut self, session: &mut Session, ctx: &ModifierContext) {
        if let Some(func) = self.registered.take() {
            session.remove_flag_interceptor(ctx.entity, self.key, &func);
        }
        if let Some(id) = self.turn_subscription.take() {
            session.unsubscribe(id);
        }
    }
}

/// Count down at each start of the owning player's turn; at zero, detach the
/// whole modifier (forced, so stacked copies expire together).
fn subscribe_turn_countdown(
    session: &mut Session,
    ctx: &ModifierContext,
    turns: u32,
    slot: &Rc<Cell<Option<SubscriptionId>>>,
) {
    let remaining = Rc::new(Cell::new(turns));
    let ctx = ctx.clone();
    let slot_handle = slot.clone();
    let id = session.subscribe(
        EventPattern::exact(event_names::PLAYER_TURN_START),
        Rc::new(move |session, event| {
            if event.player != Some(ctx.player) {
                return;
            }
            let left = remaining.get().saturating_sub(1);
            remaining.set(left);
            if left == 0 {
                if let Some(id) = slot_handle.take() {
                    session.unsubscribe(id);
                }
                // The entity may already be gone; expiry is best-effort.
                let _ = session.remove_modifier(ctx.entity, &ctx.modifier_id, true);
            }
        }),
    );
    slot.set(Some(id));
}
