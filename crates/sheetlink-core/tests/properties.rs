//! Property tests for range normalization and fixed-size paging

use proptest::prelude::*;
use sheetlink_core::paging::{FixedSizeStrategy, PagingStrategy};
use sheetlink_core::{cell_name, normalize_range, parse_range, Range};

fn cell() -> impl Strategy<Value = (u32, u32)> {
    (1u32..=16_384, 1u32..=1_048_576)
}

fn range_text() -> impl Strategy<Value = String> {
    (cell(), prop::option::of(cell()), any::<[bool; 4]>(), any::<bool>()).prop_map(
        |((c1, r1), second, anchors, lower)| {
            let anchored = |col: u32, row: u32, a: bool, b: bool| {
                let name = cell_name(col, row).unwrap();
                let split = name.find(|c: char| c.is_ascii_digit()).unwrap();
                let (letters, digits) = name.split_at(split);
                format!(
                    "{}{}{}{}",
                    if a { "$" } else { "" },
                    letters,
                    if b { "$" } else { "" },
                    digits
                )
            };
            let mut text = anchored(c1, r1, anchors[0], anchors[1]);
            if let Some((c2, r2)) = second {
                text.push(':');
                text.push_str(&anchored(c2, r2, anchors[2], anchors[3]));
            }
            if lower {
                text.to_lowercase()
            } else {
                text
            }
        },
    )
}

proptest! {
    #[test]
    fn normalize_is_idempotent(text in range_text()) {
        let once = normalize_range(&text).unwrap();
        let twice = normalize_range(&once).unwrap();
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(parse_range(&once).unwrap(), parse_range(&text).unwrap());
    }

    #[test]
    fn fixed_pages_cover_dimension(
        start_col in 1u32..40,
        width in 1u32..40,
        start_row in 1u32..500,
        height in 1u32..3000,
        budget in 1usize..20_000,
    ) {
        let dim = Range::new(start_col, start_row, start_col + width - 1, start_row + height - 1).unwrap();
        let pages = FixedSizeStrategy::new(budget, Some(dim)).calculate_paging_ranges();

        prop_assert!(!pages.is_empty());
        let mut next_row = dim.start_row;
        for page in &pages {
            prop_assert_eq!(page.start_col, dim.start_col);
            prop_assert_eq!(page.end_col, dim.end_col);
            prop_assert_eq!(page.start_row, next_row);
            prop_assert!(page.cell_count() <= budget as u64 || page.rows() == 1);
            next_row = page.end_row + 1;
        }
        prop_assert_eq!(next_row, dim.end_row + 1);
    }
}
