mod common;

use cms_inspect::policy::cms::{PrintezisSize, PrintezisSizeResolver};
use cms_inspect::util::metadata::NextMark;
use cms_inspect::Address;
use common::SyntheticHeap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const HEAP_WORDS: usize = 2048;

#[test]
fn test_single_mark_search() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x4050cb1b5ab26c70);
    for word in [4, 8] {
        for _ in 0..64 {
            let mut heap = SyntheticHeap::new(word, word, HEAP_WORDS);
            let k = rng.random_range(0..HEAP_WORDS);
            let target = heap.at(k);
            heap.mark(target);
            let bitmap = &heap.bitmap;

            let below = heap.at(rng.random_range(0..=k));
            assert_eq!(
                bitmap.next_marked_word_after(&heap.memory, below).unwrap(),
                NextMark::Found(target)
            );
            if k + 1 < HEAP_WORDS {
                let above = heap.at(rng.random_range(k + 1..HEAP_WORDS));
                assert_eq!(
                    bitmap.next_marked_word_after(&heap.memory, above).unwrap(),
                    NextMark::NotFound {
                        limit: heap.heap.end()
                    }
                );
            }
            assert_eq!(
                bitmap
                    .marked_words_in(&heap.memory, bitmap.covered_range())
                    .unwrap(),
                1
            );
        }
    }
}

#[test]
fn test_index_round_trip() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x4050cb1b5ab26c70);
    for word in [4, 8] {
        let heap = SyntheticHeap::new(word, word, HEAP_WORDS);
        let bitmap = &heap.bitmap;
        for _ in 0..1000 {
            let addr = heap.at(rng.random_range(0..HEAP_WORDS));
            let index = bitmap.address_to_index(addr).unwrap();
            assert_eq!(bitmap.index_to_address(index), addr);
        }
        assert!(bitmap.address_to_index(heap.heap.end()).is_err());
        assert!(bitmap
            .address_to_index(Address::from_usize(heap.heap.start().as_usize() - word))
            .is_err());
    }
}

#[test]
fn test_printezis_sizes() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x4050cb1b5ab26c70);
    for word in [4, 8] {
        for _ in 0..64 {
            let mut heap = SyntheticHeap::new(word, word, HEAP_WORDS);
            let a = rng.random_range(0..HEAP_WORDS - 3);
            let n = rng.random_range(2..HEAP_WORDS - a);
            heap.mark(heap.at(a));
            heap.mark(heap.at(a + 1));
            heap.mark(heap.at(a + n));

            let resolver = PrintezisSizeResolver::new(&heap.memory, &heap.bitmap);
            assert_eq!(
                resolver.resolve_size(heap.at(a)).unwrap(),
                PrintezisSize::Resolved((n + 1) * word)
            );
        }
    }
}
