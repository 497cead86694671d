use crate::error::{IndexError, IndexResult};
use crate::index::{BTreeNode, KeyType, KeyValue, NodeLayout};
use crate::storage::codec::{CommonCodec, DecodedData};

/// Fixed-width node record:
/// `is_leaf u8 | num_keys u32 | max_keys key slots | max_children u64 slots`.
/// Leaves store their data pointers in the first `max_keys` pointer slots and
/// leave the last one zeroed, so every record has the same size.
pub struct BTreeNodeCodec;

impl BTreeNodeCodec {
    pub fn encode(node: &BTreeNode, layout: &NodeLayout) -> IndexResult<Vec<u8>> {
        let num_keys = node.keys.len();
        if num_keys > layout.max_keys() {
            return Err(IndexError::Internal(format!(
                "node at {} holds {} keys, capacity is {}",
                node.offset,
                num_keys,
                layout.max_keys()
            )));
        }
        let pointers = if node.is_leaf {
            &node.data_pointers
        } else {
            &node.children
        };
        let expected_pointers = if node.is_leaf { num_keys } else { num_keys + 1 };
        if pointers.len() != expected_pointers {
            return Err(IndexError::Internal(format!(
                "node at {} has {} keys but {} pointers",
                node.offset,
                num_keys,
                pointers.len()
            )));
        }

        let mut bytes = Vec::with_capacity(layout.node_size());
        bytes.extend(CommonCodec::encode_bool(node.is_leaf));
        bytes.extend(CommonCodec::encode_u32(num_keys as u32));
        for key in node.keys.iter() {
            bytes.extend(Self::encode_key(key, layout)?);
        }
        // unused key slots
        bytes.resize(bytes.len() + (layout.max_keys() - num_keys) * layout.key_slot_size(), 0);
        for pointer in pointers.iter() {
            bytes.extend(CommonCodec::encode_u64(*pointer));
        }
        bytes.resize(layout.node_size(), 0);
        Ok(bytes)
    }

    pub fn decode(
        bytes: &[u8],
        offset: u64,
        layout: &NodeLayout,
    ) -> IndexResult<DecodedData<BTreeNode>> {
        if bytes.len() < layout.node_size() {
            return Err(IndexError::Corrupt(format!(
                "node at {} needs {} bytes, found {}",
                offset,
                layout.node_size(),
                bytes.len()
            )));
        }
        let mut left_bytes = bytes;

        let (is_leaf, consumed) = CommonCodec::decode_bool(left_bytes)?;
        left_bytes = &left_bytes[consumed..];
        let (num_keys, consumed) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[consumed..];
        let num_keys = num_keys as usize;
        if num_keys > layout.max_keys() {
            return Err(IndexError::Corrupt(format!(
                "node at {} claims {} keys, capacity is {}",
                offset,
                num_keys,
                layout.max_keys()
            )));
        }

        let mut keys = Vec::with_capacity(num_keys);
        for _ in 0..num_keys {
            let (key, consumed) = Self::decode_key(left_bytes, layout)?;
            left_bytes = &left_bytes[consumed..];
            keys.push(key);
        }
        left_bytes = &left_bytes[(layout.max_keys() - num_keys) * layout.key_slot_size()..];

        let pointer_count = if is_leaf { num_keys } else { num_keys + 1 };
        let mut pointers = Vec::with_capacity(pointer_count);
        for _ in 0..pointer_count {
            let (pointer, consumed) = CommonCodec::decode_u64(left_bytes)?;
            left_bytes = &left_bytes[consumed..];
            pointers.push(pointer);
        }

        let node = if is_leaf {
            BTreeNode {
                offset,
                is_leaf,
                key_type: layout.key_type,
                keys,
                data_pointers: pointers,
                children: vec![],
            }
        } else {
            BTreeNode {
                offset,
                is_leaf,
                key_type: layout.key_type,
                keys,
                data_pointers: vec![],
                children: pointers,
            }
        };
        Ok((node, layout.node_size()))
    }

    fn encode_key(key: &KeyValue, layout: &NodeLayout) -> IndexResult<Vec<u8>> {
        key.check_type(layout.key_type)?;
        match key {
            KeyValue::Integer(v) => Ok(CommonCodec::encode_i64(*v)),
            KeyValue::Float(v) => Ok(CommonCodec::encode_f64(*v)),
            KeyValue::Text(v) => CommonCodec::encode_fixed_string(v, layout.key_width as usize),
        }
    }

    fn decode_key(bytes: &[u8], layout: &NodeLayout) -> IndexResult<DecodedData<KeyValue>> {
        match layout.key_type {
            KeyType::Integer => {
                let (v, consumed) = CommonCodec::decode_i64(bytes)?;
                Ok((KeyValue::Integer(v), consumed))
            }
            KeyType::Float => {
                let (v, consumed) = CommonCodec::decode_f64(bytes)?;
                Ok((KeyValue::Float(v), consumed))
            }
            KeyType::Text => {
                let (v, consumed) =
                    CommonCodec::decode_fixed_string(bytes, layout.key_width as usize)?;
                Ok((KeyValue::Text(v), consumed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_and_internal_share_record_size() {
        let layout = NodeLayout::new(KeyType::Integer, 3, 8).unwrap();
        let mut leaf = BTreeNode::new_leaf(0, KeyType::Integer);
        leaf.insert_in_place(KeyValue::from(4), 40, 3).unwrap();
        let internal = BTreeNode {
            offset: 0,
            is_leaf: false,
            key_type: KeyType::Integer,
            keys: vec![KeyValue::from(4)],
            data_pointers: vec![],
            children: vec![100, 200],
        };
        let leaf_bytes = BTreeNodeCodec::encode(&leaf, &layout).unwrap();
        let internal_bytes = BTreeNodeCodec::encode(&internal, &layout).unwrap();
        assert_eq!(leaf_bytes.len(), layout.node_size());
        assert_eq!(internal_bytes.len(), layout.node_size());
        // 1 + 4 + 5 * 8 + 6 * 8
        assert_eq!(layout.node_size(), 93);
    }

    #[test]
    fn node_round_trip_text() {
        let layout = NodeLayout::new(KeyType::Text, 2, 16).unwrap();
        let mut leaf = BTreeNode::new_leaf(91, KeyType::Text);
        for (i, name) in ["cherry", "apple", "banana"].iter().enumerate() {
            leaf.insert_in_place(KeyValue::from(*name), i as u64, 2)
                .unwrap();
        }
        let bytes = BTreeNodeCodec::encode(&leaf, &layout).unwrap();
        let (decoded, consumed) = BTreeNodeCodec::decode(&bytes, 91, &layout).unwrap();
        assert_eq!(consumed, layout.node_size());
        assert_eq!(decoded, leaf);
        assert_eq!(
            decoded.keys(),
            &[
                KeyValue::from("apple"),
                KeyValue::from("banana"),
                KeyValue::from("cherry")
            ]
        );
        assert_eq!(decoded.data_pointers(), &[1, 2, 0]);
    }

    #[test]
    fn text_key_wider_than_slot_is_rejected() {
        let layout = NodeLayout::new(KeyType::Text, 2, 4).unwrap();
        let mut leaf = BTreeNode::new_leaf(0, KeyType::Text);
        leaf.insert_in_place(KeyValue::from("durian"), 1, 2).unwrap();
        assert!(matches!(
            BTreeNodeCodec::encode(&leaf, &layout),
            Err(IndexError::KeyTooLong { len: 6, width: 4 })
        ));
    }

    #[test]
    fn truncated_record_is_corrupt() {
        let layout = NodeLayout::new(KeyType::Float, 2, 8).unwrap();
        let leaf = BTreeNode::new_leaf(0, KeyType::Float);
        let bytes = BTreeNodeCodec::encode(&leaf, &layout).unwrap();
        assert!(matches!(
            BTreeNodeCodec::decode(&bytes[..bytes.len() - 1], 0, &layout),
            Err(IndexError::Corrupt(_))
        ));
    }

    #[test]
    fn oversized_key_count_is_corrupt() {
        let layout = NodeLayout::new(KeyType::Integer, 2, 8).unwrap();
        let leaf = BTreeNode::new_leaf(0, KeyType::Integer);
        let mut bytes = BTreeNodeCodec::encode(&leaf, &layout).unwrap();
        bytes[4] = 9;
        assert!(matches!(
            BTreeNodeCodec::decode(&bytes, 0, &layout),
            Err(IndexError::Corrupt(_))
        ));
    }
}
