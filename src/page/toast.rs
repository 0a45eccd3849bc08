// On-page notifications
//
// Transient banners shown after the keyboard whitelist toggle. Each banner
// fades in shortly after insertion, fades out after the display period and
// is then removed. Steps are scheduled against explicit instants so the
// watcher's event loop decides when they run.

use std::time::{Duration, Instant};

use super::dom::Document;
use super::PageConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToastStep {
    Show,
    Hide,
    Remove,
}

#[derive(Debug)]
struct ScheduledStep<N> {
    at: Instant,
    node: N,
    step: ToastStep,
}

#[derive(Debug)]
pub struct ToastQueue<N> {
    steps: Vec<ScheduledStep<N>>,
    show_delay: Duration,
    display: Duration,
    fade: Duration,
}

impl<N: Copy> ToastQueue<N> {
    pub fn new(config: &PageConfig) -> Self {
        Self {
            steps: Vec::new(),
            show_delay: config.notification_show_delay,
            display: config.notification_display,
            fade: config.notification_fade,
        }
    }

    /// Insert a banner now and schedule its fade in, fade out and removal
    pub fn show<D>(&mut self, doc: &mut D, config: &PageConfig, message: &str, now: Instant)
    where
        D: Document<Node = N>,
    {
        let node = doc.append_notice(&config.notification_class, message);
        let hide_at = now + self.display;
        self.steps.push(ScheduledStep {
            at: now + self.show_delay,
            node,
            step: ToastStep::Show,
        });
        self.steps.push(ScheduledStep {
            at: hide_at,
            node,
            step: ToastStep::Hide,
        });
        self.steps.push(ScheduledStep {
            at: hide_at + self.fade,
            node,
            step: ToastStep::Remove,
        });
    }

    /// Earliest pending step
    pub fn next_deadline(&self) -> Option<Instant> {
        self.steps.iter().map(|s| s.at).min()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step due at `now`, in schedule order
    pub fn fire_due<D>(&mut self, doc: &mut D, config: &PageConfig, now: Instant)
    where
        D: Document<Node = N>,
    {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.steps.drain(..).partition(|s| s.at <= now);
        self.steps = pending;
        due.sort_by_key(|s| s.at);

        for scheduled in due {
            match scheduled.step {
                ToastStep::Show => doc.add_class(scheduled.node, &config.notification_show_class),
                ToastStep::Hide => {
                    doc.remove_class(scheduled.node, &config.notification_show_class)
                }
                ToastStep::Remove => doc.remove_node(scheduled.node),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::tree::DomTree;

    #[test]
    fn test_toast_lifecycle() {
        let config = PageConfig::default();
        let mut doc = DomTree::new();
        let mut toasts = ToastQueue::new(&config);
        let start = Instant::now();

        toasts.show(&mut doc, &config, "Site whitelisted", start);
        let notice = doc.elements_with_class(&config.notification_class)[0];
        assert_eq!(doc.text_content(notice), "Site whitelisted");
        assert!(!doc.has_class(notice, &config.notification_show_class));
        assert_eq!(toasts.next_deadline(), Some(start + Duration::from_millis(10)));

        toasts.fire_due(&mut doc, &config, start + Duration::from_millis(10));
        assert!(doc.has_class(notice, &config.notification_show_class));

        toasts.fire_due(&mut doc, &config, start + Duration::from_millis(1999));
        assert!(doc.has_class(notice, &config.notification_show_class));

        toasts.fire_due(&mut doc, &config, start + Duration::from_millis(2000));
        assert!(!doc.has_class(notice, &config.notification_show_class));
        assert!(doc.contains(notice));

        toasts.fire_due(&mut doc, &config, start + Duration::from_millis(2300));
        assert!(!doc.contains(notice));
        assert!(toasts.is_empty());
    }

    #[test]
    fn test_late_tick_runs_steps_in_order() {
        let config = PageConfig::default();
        let mut doc = DomTree::new();
        let mut toasts = ToastQueue::new(&config);
        let start = Instant::now();

        toasts.show(&mut doc, &config, "Site removed from whitelist", start);
        let notice = doc.elements_with_class(&config.notification_class)[0];

        toasts.fire_due(&mut doc, &config, start + Duration::from_secs(5));
        assert!(!doc.contains(notice));
        assert!(!doc.has_class(notice, &config.notification_show_class));
    }
}
