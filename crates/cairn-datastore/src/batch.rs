use cairn_types::Key;

/// A queued write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Key, value: Vec<u8> },
    Delete { key: Key },
}

/// Writes queued for a single [`Datastore::commit`](crate::Datastore::commit).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a put.
    pub fn put(&mut self, key: Key, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Put {
            key,
            value: value.into(),
        });
        self
    }

    /// Queue a delete.
    pub fn delete(&mut self, key: Key) -> &mut Self {
        self.ops.push(BatchOp::Delete { key });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl IntoIterator for Batch {
    type Item = BatchOp;
    type IntoIter = std::vec::IntoIter<BatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ops_keep_insertion_order() {
        let a = Key::new("/a").unwrap();
        let b = Key::new("/b").unwrap();
        let mut batch = Batch::new();
        batch.put(a.clone(), b"1".to_vec()).delete(b.clone());
        assert_eq!(batch.len(), 2);

        let ops: Vec<BatchOp> = batch.into_iter().collect();
        assert_eq!(
            ops,
            vec![
                BatchOp::Put { key: a, value: b"1".to_vec() },
                BatchOp::Delete { key: b },
            ]
        );
    }
}
