//! Grouping of addresses into size-bounded request buckets.
//!
//! The transaction listing takes its address filter in the query string, so a wallet with
//! many addresses has to be queried in several requests. Buckets are filled in input
//! order; a bucket is closed as soon as the next address would push its cumulative byte
//! length past the threshold.

/// Default maximum of cumulative address bytes in one bucket.
pub const DEFAULT_BUCKET_THRESHOLD: usize = 1900;

/// An ordered group of addresses queried together in one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressBucket {
    addresses: Vec<String>,
    size: usize,
}

impl AddressBucket {
    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn into_addresses(self) -> Vec<String> {
        self.addresses
    }

    /// Cumulative byte length of the addresses.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    fn push(&mut self, address: String) {
        self.size += address.len();
        self.addresses.push(address);
    }
}

/// Partition `addresses` into buckets of at most `threshold` bytes each.
///
/// Every address lands in exactly one bucket and order is preserved. An address longer
/// than `threshold` cannot be split and gets a bucket of its own. An empty input yields
/// no buckets.
pub fn partition_addresses<I>(addresses: I, threshold: usize) -> Vec<AddressBucket>
where
    I: IntoIterator<Item = String>,
{
    let mut buckets = Vec::new();
    let mut current = AddressBucket::default();

    for address in addresses {
        if !current.is_empty() && current.size + address.len() > threshold {
            buckets.push(std::mem::take(&mut current));
        }
        current.push(address);
    }

    if !current.is_empty() {
        buckets.push(current);
    }
    buckets
}
