/// Row offset of a 1-based page. Saturates instead of overflowing; an offset
/// past the end just yields an empty page.
pub fn page_offset(page: i64, per_page: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(per_page.max(0))
}

pub fn total_pages(total: i64, per_page: i64) -> i64 {
    if per_page <= 0 {
        return 0;
    }
    total / per_page + i64::from(total % per_page != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_saturates() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(i64::MAX, 100), i64::MAX);
        assert_eq!(page_offset(0, 20), 0);
    }

    #[test]
    fn pages_round_up() {
        assert_eq!(total_pages(21, 10), 3);
        assert_eq!(total_pages(20, 10), 2);
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(i64::MAX, 100), i64::MAX / 100 + 1);
    }
}
