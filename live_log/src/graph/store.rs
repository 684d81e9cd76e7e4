//! Arena-backed log graph with change notifications

use crate::error::GraphError;
use crate::graph::types::{EntryKey, EntryStatus, GraphChange, LogEntryView, NewEntry};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::fmt;

/// Anything that can produce an ordered, depth-first list of entries.
pub trait GraphSource {
    fn snapshot(&self) -> Vec<LogEntryView>;
}

impl GraphSource for [LogEntryView] {
    fn snapshot(&self) -> Vec<LogEntryView> {
        self.to_vec()
    }
}

impl GraphSource for Vec<LogEntryView> {
    fn snapshot(&self) -> Vec<LogEntryView> {
        self.clone()
    }
}

/// Statistics about the graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStats {
    /// Number of entries ever inserted
    pub entries: usize,
    /// Number of entries currently active
    pub active: usize,
    /// Graph-wide revision counter
    pub revision: u64,
    /// Number of live subscribers
    pub subscribers: usize,
}

struct Node {
    parent: Option<usize>,
    children: Vec<usize>,
    depth: usize,
    view: LogEntryView,
}

#[derive(Default)]
struct Arena {
    nodes: Vec<Node>,
    roots: Vec<usize>,
    revision: u64,
}

impl Arena {
    fn slot(&self, key: EntryKey) -> Result<usize, GraphError> {
        let index = key.0 as usize;
        if index < self.nodes.len() {
            Ok(index)
        } else {
            Err(GraphError::UnknownEntry(key))
        }
    }

    fn insert(&mut self, parent: Option<EntryKey>, entry: NewEntry) -> Result<GraphChange, GraphError> {
        let parent_slot = parent.map(|key| self.slot(key)).transpose()?;
        let index = self.nodes.len();
        let key = EntryKey(index as u64);
        let depth = parent_slot.map_or(0, |p| self.nodes[p].depth + 1);
        self.revision += 1;

        let view = LogEntryView {
            key,
            parent_key: parent,
            level: entry.level,
            status: entry.status,
            from_live_stream: entry.from_live_stream,
            revision: 0,
            depth,
            label: entry.label,
            message: entry.message,
            metadata: entry.metadata,
        };
        self.nodes.push(Node {
            parent: parent_slot,
            children: Vec::new(),
            depth,
            view,
        });
        match parent_slot {
            Some(p) => self.nodes[p].children.push(index),
            None => self.roots.push(index),
        }

        Ok(GraphChange {
            key,
            from_live_stream: self.nodes[index].view.from_live_stream,
            revision: 0,
        })
    }

    fn mutate(
        &mut self,
        key: EntryKey,
        edit: impl FnOnce(&mut LogEntryView),
    ) -> Result<GraphChange, GraphError> {
        let index = self.slot(key)?;
        self.revision += 1;
        let view = &mut self.nodes[index].view;
        edit(view);
        view.revision += 1;
        Ok(GraphChange {
            key,
            from_live_stream: view.from_live_stream,
            revision: view.revision,
        })
    }

    fn snapshot(&self) -> Vec<LogEntryView> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            out.push(node.view.clone());
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }
}

/// Callback run for every change with the entry as it was right after it.
type Observer = Box<dyn Fn(&LogEntryView) + Send + Sync>;

/// Thread-safe hierarchical log graph.
///
/// Entries live in an arena and refer to each other by index, so parents and
/// children never own one another. Every insert and mutation is broadcast to
/// subscribers after the write lock is released.
pub struct LogGraph {
    arena: RwLock<Arena>,
    subscribers: Mutex<Vec<Sender<GraphChange>>>,
    observers: RwLock<Vec<Observer>>,
}

impl fmt::Debug for LogGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogGraph").field("stats", &self.stats()).finish()
    }
}

impl Default for LogGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl LogGraph {
    pub fn new() -> Self {
        Self {
            arena: RwLock::new(Arena::default()),
            subscribers: Mutex::new(Vec::new()),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> Receiver<GraphChange> {
        let (sender, receiver) = unbounded();
        self.subscribers.lock().push(sender);
        receiver
    }

    /// Run `observer` synchronously on every future change.
    ///
    /// The observer sees the entry exactly as the change left it, in the
    /// order the changes were made. It runs under the graph's write lock and
    /// must not call back into the graph.
    pub fn observe(&self, observer: impl Fn(&LogEntryView) + Send + Sync + 'static) {
        self.observers.write().push(Box::new(observer));
    }

    /// Insert a new entry under `parent`, or as a root when `parent` is `None`.
    pub fn insert(&self, parent: Option<EntryKey>, entry: NewEntry) -> Result<EntryKey, GraphError> {
        let change = self.commit(|arena| arena.insert(parent, entry))?;
        Ok(change.key)
    }

    /// Replace the message of an entry.
    pub fn update_message(&self, key: EntryKey, message: impl Into<String>) -> Result<(), GraphError> {
        let message = message.into();
        self.commit(|arena| arena.mutate(key, |view| view.message = message))?;
        Ok(())
    }

    /// Append a chunk of raw output to an entry.
    pub fn append_output(&self, key: EntryKey, chunk: &str) -> Result<(), GraphError> {
        self.commit(|arena| {
            arena.mutate(key, |view| {
                if !view.message.is_empty() && !view.message.ends_with('\n') {
                    view.message.push('\n');
                }
                view.message.push_str(chunk.trim_end_matches('\n'));
            })
        })?;
        Ok(())
    }

    /// Change the status of an entry.
    pub fn set_status(&self, key: EntryKey, status: EntryStatus) -> Result<(), GraphError> {
        self.commit(|arena| arena.mutate(key, |view| view.status = status))?;
        Ok(())
    }

    /// Read one entry.
    pub fn entry(&self, key: EntryKey) -> Option<LogEntryView> {
        let arena = self.arena.read();
        arena.slot(key).ok().map(|index| arena.nodes[index].view.clone())
    }

    /// Parent of an entry, if any.
    pub fn parent(&self, key: EntryKey) -> Option<EntryKey> {
        let arena = self.arena.read();
        let index = arena.slot(key).ok()?;
        arena.nodes[index].parent.map(|p| arena.nodes[p].view.key)
    }

    /// Graph-wide revision counter; bumps on every change.
    pub fn revision(&self) -> u64 {
        self.arena.read().revision
    }

    pub fn stats(&self) -> GraphStats {
        let arena = self.arena.read();
        GraphStats {
            entries: arena.nodes.len(),
            active: arena.nodes.iter().filter(|n| n.view.status.is_active()).count(),
            revision: arena.revision,
            subscribers: self.subscribers.lock().len(),
        }
    }

    fn commit(
        &self,
        apply: impl FnOnce(&mut Arena) -> Result<GraphChange, GraphError>,
    ) -> Result<GraphChange, GraphError> {
        let change = {
            let mut arena = self.arena.write();
            let change = apply(&mut arena)?;
            let observers = self.observers.read();
            if !observers.is_empty() {
                let view = &arena.nodes[change.key.0 as usize].view;
                for observer in observers.iter() {
                    observer(view);
                }
            }
            change
        };
        self.notify(change);
        Ok(change)
    }

    fn notify(&self, change: GraphChange) {
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(change).is_ok());
    }
}

impl GraphSource for LogGraph {
    fn snapshot(&self) -> Vec<LogEntryView> {
        self.arena.read().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LogLevel;

    fn keys(graph: &LogGraph) -> Vec<u64> {
        graph.snapshot().iter().map(|v| v.key.0).collect()
    }

    #[test]
    fn test_snapshot_is_depth_first() {
        let graph = LogGraph::new();
        let a = graph.insert(None, NewEntry::task("a", "build")).unwrap();
        let b = graph.insert(None, NewEntry::task("b", "test")).unwrap();
        let a1 = graph.insert(Some(a), NewEntry::new(LogLevel::Info, "a1")).unwrap();
        graph.insert(Some(b), NewEntry::new(LogLevel::Info, "b1")).unwrap();
        graph.insert(Some(a1), NewEntry::new(LogLevel::Info, "a1x")).unwrap();
        graph.insert(Some(a), NewEntry::new(LogLevel::Info, "a2")).unwrap();

        assert_eq!(keys(&graph), vec![0, 2, 4, 5, 1, 3]);

        let depths: Vec<usize> = graph.snapshot().iter().map(|v| v.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 1, 0, 1]);
    }

    #[test]
    fn test_unknown_parent_is_rejected() {
        let graph = LogGraph::new();
        let result = graph.insert(Some(EntryKey(7)), NewEntry::new(LogLevel::Info, "orphan"));
        assert_eq!(result, Err(GraphError::UnknownEntry(EntryKey(7))));
        assert!(graph.snapshot().is_empty());
    }

    #[test]
    fn test_mutations_bump_revisions_and_notify() {
        let graph = LogGraph::new();
        let changes = graph.subscribe();

        let key = graph.insert(None, NewEntry::stream(LogLevel::Info)).unwrap();
        graph.append_output(key, "line one\n").unwrap();
        graph.append_output(key, "line two").unwrap();
        graph.set_status(key, EntryStatus::Done).unwrap();

        let received: Vec<GraphChange> = changes.try_iter().collect();
        assert_eq!(received.len(), 4);
        assert!(received.iter().all(|c| c.from_live_stream));
        assert_eq!(received.last().map(|c| c.revision), Some(3));

        let view = graph.entry(key).unwrap();
        assert_eq!(view.message, "line one\nline two");
        assert_eq!(view.status, EntryStatus::Done);
        assert_eq!(graph.revision(), 4);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let graph = LogGraph::new();
        let kept = graph.subscribe();
        drop(graph.subscribe());

        graph.insert(None, NewEntry::new(LogLevel::Info, "hello")).unwrap();

        assert_eq!(kept.try_iter().count(), 1);
        assert_eq!(graph.stats().subscribers, 1);
    }

    #[test]
    fn test_observers_see_every_revision() {
        let graph = LogGraph::new();
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);
        graph.observe(move |view| sink.lock().push((view.revision, view.message.clone())));

        let key = graph.insert(None, NewEntry::stream(LogLevel::Info)).unwrap();
        graph.append_output(key, "one").unwrap();
        graph.append_output(key, "two").unwrap();
        assert!(graph.set_status(EntryKey(9), EntryStatus::Done).is_err());

        assert_eq!(
            *seen.lock(),
            vec![
                (0, String::new()),
                (1, "one".to_string()),
                (2, "one\ntwo".to_string()),
            ]
        );
    }

    #[test]
    fn test_debug_shows_stats() {
        let graph = LogGraph::new();
        graph.insert(None, NewEntry::task("a", "")).unwrap();
        let text = format!("{graph:?}");
        assert!(text.starts_with("LogGraph"));
        assert!(text.contains("entries: 1"));
    }

    #[test]
    fn test_parent_lookup() {
        let graph = LogGraph::new();
        let root = graph.insert(None, NewEntry::task("root", "")).unwrap();
        let child = graph.insert(Some(root), NewEntry::new(LogLevel::Debug, "c")).unwrap();
        assert_eq!(graph.parent(child), Some(root));
        assert_eq!(graph.parent(root), None);
        assert_eq!(graph.stats().active, 1);
    }
}
