//! セッションイベント
//!
//! 種類は固定の列挙型、ペイロードは値型。ハンドラは登録順に同期的に呼ばれる。

use paperfold_common::{Choice, FilterKey, SessionMode, TaskVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Initialized,
    QuestionShown,
    AnswerRecorded,
    FilterApplied,
    VariantSwitched,
    Regenerated,
    Submitted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Initialized {
        variant: TaskVariant,
        mode: SessionMode,
        total: usize,
        answered: usize,
    },
    QuestionShown {
        variant: TaskVariant,
        index: usize,
        item_id: String,
    },
    AnswerRecorded {
        variant: TaskVariant,
        item_id: String,
        choice: Choice,
    },
    FilterApplied {
        variant: TaskVariant,
        filter: FilterKey,
        count: usize,
    },
    VariantSwitched {
        from: TaskVariant,
        to: TaskVariant,
    },
    Regenerated {
        variant: TaskVariant,
        seed: u64,
        count: usize,
    },
    Submitted {
        variant: TaskVariant,
        answered: usize,
        total: usize,
        correct: usize,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Initialized { .. } => EventKind::Initialized,
            Event::QuestionShown { .. } => EventKind::QuestionShown,
            Event::AnswerRecorded { .. } => EventKind::AnswerRecorded,
            Event::FilterApplied { .. } => EventKind::FilterApplied,
            Event::VariantSwitched { .. } => EventKind::VariantSwitched,
            Event::Regenerated { .. } => EventKind::Regenerated,
            Event::Submitted { .. } => EventKind::Submitted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    handlers: Vec<(SubscriptionId, EventKind, Handler)>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.handlers.push((id, kind, Box::new(handler)));
        id
    }

    /// 登録解除（見つからなければfalse）
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(sub, _, _)| *sub != id);
        self.handlers.len() != before
    }

    pub fn emit(&self, event: &Event) {
        let kind = event.kind();
        for (_, _, handler) in self.handlers.iter().filter(|(_, k, _)| *k == kind) {
            handler(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_emit_only_matching_kind_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();

        let log = seen.clone();
        bus.on(EventKind::VariantSwitched, move |_| log.lock().unwrap().push("first"));
        let log = seen.clone();
        bus.on(EventKind::Submitted, move |_| log.lock().unwrap().push("submitted"));
        let log = seen.clone();
        bus.on(EventKind::VariantSwitched, move |_| log.lock().unwrap().push("second"));

        bus.emit(&Event::VariantSwitched {
            from: TaskVariant::Task1,
            to: TaskVariant::Task2,
        });

        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_off_removes_handler() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();
        let counter = count.clone();
        let id = bus.on(EventKind::AnswerRecorded, move |_| *counter.lock().unwrap() += 1);

        let event = Event::AnswerRecorded {
            variant: TaskVariant::Task1,
            item_id: "q1".into(),
            choice: Choice::B,
        };
        bus.emit(&event);
        assert!(bus.off(id));
        assert!(!bus.off(id));
        bus.emit(&event);

        assert_eq!(*count.lock().unwrap(), 1);
    }
}
