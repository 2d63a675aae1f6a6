use protocol::SuiteRecord;

/// Folds one fetched page of suite rows into the sequence accumulated so
/// far and advances the pagination bookmark.
///
/// The runner paginates by task count, not by suite, so a suite can span a
/// page boundary: the first row of the new page then carries the same suite
/// name as the last accumulated row and is a continuation of it, not a new
/// suite. The two rows are combined field-wise into one.
///
/// The bookmark is whatever the runner returned with the page. An empty
/// page leaves both the sequence and the bookmark untouched; the caller
/// still re-arms its refresh timer.
pub(crate) fn merge_suites(
    existing: &mut Vec<SuiteRecord>,
    incoming: Vec<SuiteRecord>,
    bookmark: &mut u64,
    next_bookmark: u64,
) {
    if incoming.is_empty() {
        return;
    }
    let mut incoming = incoming.into_iter();
    if let Some(last) = existing.last_mut() {
        let first = incoming.next();
        if let Some(first) = first {
            if last.suite == first.suite {
                last.tasks += first.tasks;
                last.complete += first.complete;
                last.success += first.success;
                last.duration_ms += first.duration_ms;
            } else {
                existing.push(first);
            }
        }
    }
    existing.extend(incoming);
    *bookmark = next_bookmark;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite(name: &str, tasks: u64, complete: u64, success: u64, duration_ms: u64) -> SuiteRecord {
        SuiteRecord {
            suite: name.to_string(),
            tasks,
            complete,
            success,
            duration_ms,
        }
    }

    #[test]
    fn first_page_is_taken_as_is() {
        let mut suites = Vec::new();
        let mut bookmark = 0;
        merge_suites(
            &mut suites,
            vec![suite("auth", 5, 5, 5, 100)],
            &mut bookmark,
            10,
        );
        assert_eq!(suites, vec![suite("auth", 5, 5, 5, 100)]);
        assert_eq!(bookmark, 10);
    }

    #[test]
    fn non_overlapping_pages_append_in_order() {
        let mut suites = vec![suite("auth", 5, 5, 5, 100)];
        let mut bookmark = 10;
        merge_suites(
            &mut suites,
            vec![suite("billing", 3, 3, 2, 40), suite("core", 8, 8, 8, 200)],
            &mut bookmark,
            25,
        );
        assert_eq!(
            suites,
            vec![
                suite("auth", 5, 5, 5, 100),
                suite("billing", 3, 3, 2, 40),
                suite("core", 8, 8, 8, 200),
            ]
        );
        assert_eq!(bookmark, 25);
    }

    #[test]
    fn boundary_continuation_is_stitched_field_wise() {
        let mut suites = vec![suite("auth", 5, 5, 5, 100)];
        let mut bookmark = 10;
        merge_suites(
            &mut suites,
            vec![suite("auth", 2, 2, 1, 20), suite("billing", 3, 3, 3, 40)],
            &mut bookmark,
            20,
        );
        assert_eq!(
            suites,
            vec![suite("auth", 7, 7, 6, 120), suite("billing", 3, 3, 3, 40)]
        );
        assert_eq!(bookmark, 20);
    }

    #[test]
    fn stitched_page_length_is_sum_minus_one() {
        let mut suites = vec![suite("a", 1, 1, 1, 1), suite("b", 2, 2, 2, 2)];
        let mut bookmark = 5;
        merge_suites(
            &mut suites,
            vec![suite("b", 1, 1, 0, 3), suite("c", 1, 1, 1, 4)],
            &mut bookmark,
            9,
        );
        assert_eq!(suites.len(), 3);
        assert_eq!(suites[1], suite("b", 3, 3, 2, 5));
    }

    #[test]
    fn empty_page_changes_nothing() {
        let mut suites = vec![suite("auth", 5, 5, 5, 100)];
        let mut bookmark = 10;
        merge_suites(&mut suites, Vec::new(), &mut bookmark, 99);
        assert_eq!(suites, vec![suite("auth", 5, 5, 5, 100)]);
        assert_eq!(bookmark, 10);
    }

    #[test]
    fn single_row_page_continuing_the_last_suite() {
        let mut suites = vec![suite("auth", 5, 5, 5, 100)];
        let mut bookmark = 10;
        merge_suites(&mut suites, vec![suite("auth", 1, 1, 1, 7)], &mut bookmark, 11);
        assert_eq!(suites, vec![suite("auth", 6, 6, 6, 107)]);
        assert_eq!(bookmark, 11);
    }
}
