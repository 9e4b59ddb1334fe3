//! Plain-text transcript of a timeline for terminal output.

use std::fmt::Write as _;

use strand_timeline::TimelineItem;
use strand_timeline::TimelineState;
use strand_timeline::types::CallChild;

/// One block per item, in timeline order.
pub fn transcript(state: &TimelineState) -> String {
    let mut out = String::new();
    for item in state.iter() {
        render_item(&mut out, item);
    }
    out
}

fn render_item(out: &mut String, item: &TimelineItem) {
    match item {
        TimelineItem::UserMessage(m) => {
            let _ = writeln!(out, "> {}", m.content);
            if m.withdrawn.is_some() {
                let _ = writeln!(out, "  (withdrawn)");
            }
        }
        TimelineItem::Greeting(g) => {
            let text = g.title.as_deref().unwrap_or(&g.body);
            let _ = writeln!(out, "[greeting] {text}");
        }
        TimelineItem::Waiting(_) => {
            let _ = writeln!(out, "...");
        }
        TimelineItem::CallCluster(c) => {
            for child in c.children.iter() {
                render_child(out, child);
            }
            if let Some(error) = &c.error {
                let _ = writeln!(out, "[call failed] {error}");
            }
        }
        TimelineItem::ToolCall(t) => {
            let _ = write!(out, "[tool] {} ({:?}", t.label, t.status);
            if let Some(ms) = t.elapsed_ms {
                let _ = write!(out, ", {ms} ms");
            }
            let _ = writeln!(out, ")");
            for data in t.children.iter() {
                render_child(out, &CallChild::from(data.clone()));
            }
        }
        TimelineItem::Error(e) => {
            let _ = writeln!(out, "[error] {}", e.message);
        }
        TimelineItem::Final(_) => {}
        TimelineItem::MemoryEvent(m) => {
            let _ = writeln!(out, "[memory] {:?}", m.kind);
        }
        TimelineItem::SupportEvent(s) => {
            let text = s.content.as_deref().or(s.message.as_deref()).unwrap_or_default();
            let _ = writeln!(out, "[support] {:?} {text}", s.kind);
        }
        TimelineItem::SkillActivated(s) => {
            let _ = writeln!(out, "[skill] {}", s.skill_name);
        }
        TimelineItem::Custom(c) => {
            let _ = writeln!(out, "[{}] {}", c.kind, c.data);
        }
    }
}

fn render_child(out: &mut String, child: &CallChild) {
    match child {
        CallChild::Reasoning(r) => {
            let _ = writeln!(out, "  (thinking) {}", r.text.trim());
        }
        CallChild::Content(c) => {
            let _ = writeln!(out, "{}", c.text);
        }
        CallChild::Products(p) => {
            for product in &p.products {
                match product.price {
                    Some(price) => {
                        let _ = writeln!(out, "  * {} ({price:.2})", product.name);
                    }
                    None => {
                        let _ = writeln!(out, "  * {}", product.name);
                    }
                }
            }
        }
        CallChild::Todos(t) => {
            for todo in &t.todos {
                let _ = writeln!(out, "  - [{:?}] {}", todo.status, todo.content);
            }
        }
        CallChild::ContextSummarized(s) => {
            let _ = writeln!(
                out,
                "  (context summarized: {} -> {} messages)",
                s.messages_before, s.messages_after
            );
        }
    }
}
