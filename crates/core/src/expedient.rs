use serde::{Deserialize, Serialize};

use crate::instant::UtcInstant;

/// Progress of a single order. The declaration order is the sorting priority:
/// `Urgent` is the most pressing, `Done` the least.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderState {
    Urgent,
    Todo,
    Awaiting,
    InStore,
    Done,
}

impl OrderState {
    pub const ALL: [OrderState; 5] = [
        OrderState::Urgent,
        OrderState::Todo,
        OrderState::Awaiting,
        OrderState::InStore,
        OrderState::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::Todo => "todo",
            Self::Awaiting => "awaiting",
            Self::InStore => "in_store",
            Self::Done => "done",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub title: String,
    pub description: String,
    pub state: OrderState,
    /// Last state change. For `Awaiting` orders this is the "awaiting until" instant.
    pub instant: UtcInstant,
}

impl Order {
    pub fn blank(now: UtcInstant) -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            state: OrderState::Todo,
            instant: now,
        }
    }

    /// Whether an `Awaiting` order has reached its instant and belongs in store.
    pub fn awaiting_elapsed(&self, now: UtcInstant) -> bool {
        self.state == OrderState::Awaiting && self.instant.is_reached(now)
    }
}

/// A work order tied to one vehicle and customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expedient {
    pub created: UtcInstant,
    pub user: String,
    pub model: String,
    pub license_plate: String,
    pub vin: String,
    pub description: String,
    pub orders: Vec<Order>,
}

impl Expedient {
    /// An empty expedient. It already carries the one order every expedient needs.
    pub fn blank(now: UtcInstant) -> Self {
        Self {
            created: now,
            user: String::new(),
            model: String::new(),
            license_plate: String::new(),
            vin: String::new(),
            description: String::new(),
            orders: vec![Order::blank(now)],
        }
    }

    /// Restores the non-empty order list invariant. Returns true if a blank
    /// order had to be inserted.
    pub fn ensure_orders(&mut self, now: UtcInstant) -> bool {
        if self.orders.is_empty() {
            self.orders.push(Order::blank(now));
            return true;
        }
        false
    }

    /// The most recent instant among the orders, or the creation instant
    /// when there are none. Lists sort by this.
    pub fn newest_instant(&self) -> UtcInstant {
        self.orders
            .iter()
            .map(|order| order.instant)
            .max()
            .unwrap_or(self.created)
    }

    /// The most pressing state among the orders; `Done` when nothing is pending.
    pub fn global_state(&self) -> OrderState {
        self.orders
            .iter()
            .map(|order| order.state)
            .min()
            .unwrap_or(OrderState::Done)
    }

    /// Moves every elapsed `Awaiting` order to `InStore`, stamping `now`.
    /// Returns how many orders changed.
    pub fn promote_awaiting(&mut self, now: UtcInstant) -> usize {
        let mut promoted = 0;
        for order in self.orders.iter_mut().filter(|o| o.awaiting_elapsed(now)) {
            order.state = OrderState::InStore;
            order.instant = now;
            promoted += 1;
        }
        promoted
    }

    /// Titles of the orders still open, in list order.
    pub fn open_order_titles(&self) -> impl Iterator<Item = &str> {
        self.orders
            .iter()
            .filter(|order| !order.state.is_done())
            .map(|order| order.title.as_str())
    }
}

/// First whitespace-separated word of a customer field, or "" when blank.
pub fn first_name(user: &str) -> &str {
    user.split_whitespace().next().unwrap_or("")
}
