use std::collections::HashMap;
use std::sync::Arc;
use stepper_protocol::{StepRecord, StreamKind};

/// Fetched records and the step listing for one stream.
///
/// Entries are never evicted one by one: the cache is either merged into or cleared
/// as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamCache {
    kind: StreamKind,
    records: HashMap<usize, Arc<StepRecord>>,
    table: Option<Arc<str>>,
    current: Arc<StepRecord>,
}

impl StreamCache {
    pub fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            records: HashMap::new(),
            table: None,
            current: Arc::new(StepRecord::loading(kind)),
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn get(&self, step_number: usize) -> Option<Arc<StepRecord>> {
        self.records.get(&step_number).cloned()
    }

    /// Merge `records` (replacing any with the same step number) and, when given,
    /// replace the table. Records of the other stream kind are dropped.
    pub fn fill<I>(&mut self, records: I, table: Option<String>)
    where
        I: IntoIterator<Item = StepRecord>,
    {
        for record in records {
            if record.kind() != self.kind {
                log::warn!(
                    "Dropping {} step {} delivered for the {} stream",
                    record.kind(),
                    record.step_number(),
                    self.kind
                );
                continue;
            }
            self.records.insert(record.step_number(), Arc::new(record));
        }
        if let Some(table) = table {
            self.table = Some(Arc::from(table));
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.table = None;
        self.current = Arc::new(StepRecord::loading(self.kind));
    }

    pub fn table(&self) -> Option<&Arc<str>> {
        self.table.as_ref()
    }

    /// An empty table counts as missing.
    pub fn has_table(&self) -> bool {
        self.table.as_deref().is_some_and(|table| !table.is_empty())
    }

    pub fn current(&self) -> &Arc<StepRecord> {
        &self.current
    }

    pub(crate) fn set_current(&mut self, record: Arc<StepRecord>) {
        self.current = record;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
