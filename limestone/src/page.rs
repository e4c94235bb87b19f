//! The slotted heap-page layout.
//!
//! A page is `PAGE_SIZE` bytes: a slot-occupancy bitmap (one bit per
//! slot, LSB-first within each byte), then `N` fixed-width tuple
//! records, then zero padding. `N = floor((PAGE_SIZE * 8) /
//! (tuple_size * 8 + 1))`, which charges each slot its bitmap bit.

use std::sync::Arc;

use bytes::Buf;

use crate::error::DbError;
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};
use crate::{PageId, RecordId, PAGE_SIZE};

/// Number of tuple slots on a page holding tuples of `tuple_size` bytes.
pub fn slots_for(tuple_size: usize) -> usize {
    (PAGE_SIZE * 8) / (tuple_size * 8 + 1)
}

/// Number of header bytes for a page with `num_slots` slots.
fn header_size(num_slots: usize) -> usize {
    num_slots.div_ceil(8)
}

/// An all-zero page image, used when extending a file.
pub fn empty_page_data() -> Vec<u8> {
    vec![0; PAGE_SIZE]
}

/// One in-memory page of a heap file.
#[derive(Debug)]
pub struct HeapPage {
    pid: PageId,
    desc: Arc<TupleDesc>,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    num_slots: usize,
    dirtied_by: Option<TransactionId>,
    before_image: Vec<u8>,
}

impl HeapPage {
    /// Parses a page from its on-disk image. The before image is
    /// initialized to the bytes just read.
    pub fn new(pid: PageId, desc: Arc<TupleDesc>, data: &[u8]) -> Result<Self, DbError> {
        if data.len() != PAGE_SIZE {
            return Err(DbError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "page image has wrong length",
            )));
        }

        let tuple_size = desc.size();
        let num_slots = slots_for(tuple_size);
        let hdr_len = header_size(num_slots);
        let header = data[..hdr_len].to_vec();

        let mut buf = &data[hdr_len..];
        let mut tuples = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            let used = header[slot / 8] >> (slot % 8) & 0x1 == 0x1;
            if used {
                let mut t = Tuple::parse(desc.clone(), &mut buf)?;
                t.set_record_id(Some(RecordId::new(pid, slot as u16)));
                tuples.push(Some(t));
            } else {
                buf.advance(tuple_size);
                tuples.push(None);
            }
        }

        let mut page = Self {
            pid,
            desc,
            header,
            tuples,
            num_slots,
            dirtied_by: None,
            before_image: Vec::new(),
        };
        page.set_before_image();
        Ok(page)
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn slot_count(&self) -> usize {
        self.num_slots
    }

    pub fn slot_used(&self, slot: usize) -> bool {
        slot < self.num_slots && self.header[slot / 8] >> (slot % 8) & 0x1 == 0x1
    }

    pub fn empty_slot_count(&self) -> usize {
        (0..self.num_slots).filter(|&i| !self.slot_used(i)).count()
    }

    fn set_slot(&mut self, slot: usize, used: bool) {
        let mask = 1u8 << (slot % 8);
        if used {
            self.header[slot / 8] |= mask;
        } else {
            self.header[slot / 8] &= !mask;
        }
    }

    /// Serializes the page back to its `PAGE_SIZE`-byte image. Feeding
    /// the result to `HeapPage::new` reproduces an equal page.
    pub fn serialize(&self) -> Vec<u8> {
        let tuple_size = self.desc.size();
        let mut data = Vec::with_capacity(PAGE_SIZE);
        data.extend_from_slice(&self.header);
        for slot in 0..self.num_slots {
            match &self.tuples[slot] {
                Some(t) if self.slot_used(slot) => t.serialize(&mut data),
                _ => data.extend(std::iter::repeat(0).take(tuple_size)),
            }
        }
        data.resize(PAGE_SIZE, 0);
        data
    }

    /// Stores `t` in the lowest-numbered empty slot and stamps its
    /// record id. The stamped tuple is returned via the record id.
    pub fn insert_tuple(&mut self, t: &Tuple) -> Result<RecordId, DbError> {
        if **t.desc() != *self.desc {
            return Err(DbError::SchemaMismatch);
        }
        let slot = (0..self.num_slots)
            .find(|&i| !self.slot_used(i))
            .ok_or(DbError::PageFull)?;

        let rid = RecordId::new(self.pid, slot as u16);
        let mut stored = t.clone();
        stored.set_record_id(Some(rid));
        self.set_slot(slot, true);
        self.tuples[slot] = Some(stored);
        Ok(rid)
    }

    /// Clears the slot named by `t`'s record id. Fails with `NotOnPage`
    /// if the tuple is addressed to another page or the slot is already
    /// empty.
    pub fn delete_tuple(&mut self, t: &Tuple) -> Result<(), DbError> {
        let rid = t.record_id().ok_or(DbError::NotOnPage)?;
        let slot = rid.slot as usize;
        if rid.pid != self.pid || !self.slot_used(slot) {
            return Err(DbError::NotOnPage);
        }
        self.set_slot(slot, false);
        self.tuples[slot] = None;
        Ok(())
    }

    /// Occupied tuples in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().filter_map(|t| t.as_ref())
    }

    pub fn mark_dirty(&mut self, tid: TransactionId) {
        self.dirtied_by = Some(tid);
    }

    pub fn mark_clean(&mut self) {
        self.dirtied_by = None;
    }

    /// The transaction that last dirtied this page, or `None` if clean.
    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    /// Snapshots the current bytes as the image to revert to.
    pub fn set_before_image(&mut self) {
        self.before_image = self.serialize();
    }

    /// The page as of the last quiesced point.
    pub fn before_image(&self) -> Result<HeapPage, DbError> {
        HeapPage::new(self.pid, self.desc.clone(), &self.before_image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{Field, FieldType, STRING_CAPACITY};

    fn two_int_desc() -> Arc<TupleDesc> {
        Arc::new(TupleDesc::unnamed(vec![FieldType::Int, FieldType::Int]))
    }

    fn int_pair(desc: &Arc<TupleDesc>, a: i32, b: i32) -> Tuple {
        Tuple::new(desc.clone(), vec![Field::Int(a), Field::Int(b)]).unwrap()
    }

    #[test]
    fn slot_count_formula() {
        // two ints: 8 bytes, 65 bits per slot with the header bit
        assert_eq!(slots_for(8), 504);
        // int + string: 4 + 132 bytes
        assert_eq!(
            slots_for(4 + 4 + STRING_CAPACITY),
            (PAGE_SIZE * 8) / (136 * 8 + 1)
        );
    }

    #[test]
    fn insert_serialize_reparse_yields_same_tuples() {
        let desc = two_int_desc();
        let pid = PageId::new(1, 0);
        let mut page = HeapPage::new(pid, desc.clone(), &empty_page_data()).unwrap();
        assert_eq!(page.slot_count(), 504);

        for i in 0..10 {
            page.insert_tuple(&int_pair(&desc, i, i * 2)).unwrap();
        }

        let data = page.serialize();
        let reparsed = HeapPage::new(pid, desc, &data).unwrap();
        let rows: Vec<(i32, i32)> = reparsed
            .iter()
            .map(|t| match (t.field(0), t.field(1)) {
                (Field::Int(a), Field::Int(b)) => (*a, *b),
                _ => panic!("expected ints"),
            })
            .collect();
        assert_eq!(rows, (0..10).map(|i| (i, i * 2)).collect::<Vec<_>>());
    }

    #[test]
    fn empty_page_round_trips() {
        let desc = two_int_desc();
        let pid = PageId::new(3, 7);
        let page = HeapPage::new(pid, desc, &empty_page_data()).unwrap();
        assert_eq!(page.iter().count(), 0);
        assert_eq!(page.serialize(), empty_page_data());
    }

    #[test]
    fn header_bit_tracks_occupancy() {
        let desc = two_int_desc();
        let mut page = HeapPage::new(PageId::new(1, 0), desc.clone(), &empty_page_data()).unwrap();

        let t = int_pair(&desc, 5, 6);
        let rid = page.insert_tuple(&t).unwrap();
        assert_eq!(rid.slot, 0);
        assert!(page.slot_used(0));

        let mut stored = t.clone();
        stored.set_record_id(Some(rid));
        page.delete_tuple(&stored).unwrap();
        assert!(!page.slot_used(0));
        assert_eq!(page.iter().count(), 0);

        // the slot is reusable after deletion
        let rid2 = page.insert_tuple(&t).unwrap();
        assert_eq!(rid2.slot, 0);
    }

    #[test]
    fn insert_fills_lowest_slot_and_rejects_when_full() {
        let desc = two_int_desc();
        let mut page = HeapPage::new(PageId::new(1, 0), desc.clone(), &empty_page_data()).unwrap();
        let n = page.slot_count();
        for i in 0..n {
            let rid = page.insert_tuple(&int_pair(&desc, i as i32, 0)).unwrap();
            assert_eq!(rid.slot as usize, i);
        }
        assert_eq!(page.empty_slot_count(), 0);
        assert!(matches!(
            page.insert_tuple(&int_pair(&desc, 0, 0)),
            Err(DbError::PageFull)
        ));
    }

    #[test]
    fn insert_rejects_schema_mismatch() {
        let desc = two_int_desc();
        let mut page = HeapPage::new(PageId::new(1, 0), desc, &empty_page_data()).unwrap();
        let other = Arc::new(TupleDesc::unnamed(vec![FieldType::Int]));
        let t = Tuple::new(other, vec![Field::Int(1)]).unwrap();
        assert!(matches!(
            page.insert_tuple(&t),
            Err(DbError::SchemaMismatch)
        ));
    }

    #[test]
    fn delete_rejects_foreign_and_empty_slots() {
        let desc = two_int_desc();
        let mut page = HeapPage::new(PageId::new(1, 0), desc.clone(), &empty_page_data()).unwrap();

        // tuple addressed to a different page
        let mut foreign = int_pair(&desc, 1, 2);
        foreign.set_record_id(Some(RecordId::new(PageId::new(1, 9), 0)));
        assert!(matches!(
            page.delete_tuple(&foreign),
            Err(DbError::NotOnPage)
        ));

        // right page, empty slot
        let mut hollow = int_pair(&desc, 1, 2);
        hollow.set_record_id(Some(RecordId::new(PageId::new(1, 0), 3)));
        assert!(matches!(page.delete_tuple(&hollow), Err(DbError::NotOnPage)));
    }

    #[test]
    fn dirty_flag_remembers_the_transaction() {
        let desc = two_int_desc();
        let mut page = HeapPage::new(PageId::new(1, 0), desc, &empty_page_data()).unwrap();
        assert_eq!(page.is_dirty(), None);
        let tid = TransactionId::from_raw(42);
        page.mark_dirty(tid);
        assert_eq!(page.is_dirty(), Some(tid));
        page.mark_clean();
        assert_eq!(page.is_dirty(), None);
    }

    #[test]
    fn before_image_reverts_later_inserts() {
        let desc = two_int_desc();
        let mut page = HeapPage::new(PageId::new(1, 0), desc.clone(), &empty_page_data()).unwrap();
        page.insert_tuple(&int_pair(&desc, 1, 1)).unwrap();
        page.set_before_image();
        page.insert_tuple(&int_pair(&desc, 2, 2)).unwrap();

        let before = page.before_image().unwrap();
        assert_eq!(before.iter().count(), 1);
        assert_eq!(page.iter().count(), 2);
    }
}
