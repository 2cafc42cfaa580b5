/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two. The result is the least multiple of
/// `align` that is greater than or equal to `value`.
///
/// # Examples
///
/// ```rust
/// use rpool::align_to;
///
/// assert_eq!(align_to!(13, 8), 16);
/// assert_eq!(align_to!(16, 8), 16);
/// assert_eq!(align_to!(1, 16), 16);
/// assert_eq!(align_to!(0, 8), 0);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    (($value) + ($align) - 1) & !(($align) - 1)
  };
}

#[cfg(test)]
mod tests {
  #[test]
  fn test_align_to() {
    for align in [8usize, 16, 32] {
      let mut alignments = Vec::new();

      for i in 0..10 {
        let sizes = (align * i + 1)..=(align * (i + 1));

        let expected_alignment = align * (i + 1);

        alignments.push((sizes, expected_alignment));
      }

      for (sizes, expected) in alignments {
        for size in sizes {
          assert_eq!(expected, align_to!(size, align));
        }
      }
    }
  }

  #[test]
  fn test_align_to_exact_multiple() {
    assert_eq!(align_to!(64usize, 8usize), 64);
    assert_eq!(align_to!(128usize, 8usize), 128);
  }
}
