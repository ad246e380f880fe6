//! Text rendering of tensor views.
//!
//! The layout resembles numpy's, except that in column-major mode the
//! innermost matrix level prints in Matlab style: rows are separated by `;`
//! and a row lists the elements along the second axis. Long axes are elided
//! with `...`.

use std::fmt;

use crate::scalar::Scalar;
use crate::view::TensorView;

/// Options for [`TensorView::as_string`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Axes longer than this print their first `(max_items + 1) / 2` and
    /// last `max_items / 2` entries around an ellipsis.
    pub max_items: usize,
    /// Print the matrix level transposed, Matlab style.
    pub column_major: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            max_items: 6,
            column_major: true,
        }
    }
}

struct Printer<'a, T: Scalar> {
    view: &'a TensorView<T>,
    options: FormatOptions,
    out: String,
}

impl<T: Scalar> Printer<'_, T> {
    // Prints the sub-tensor of rank `sub_rank` at storage position `pos`,
    // which is entry `index` along `axis` of its parent. Returns the next
    // index the parent should print.
    fn print(&mut self, pos: isize, sub_rank: usize, axis: usize, index: usize) -> usize {
        let view = self.view;
        let dims = view.shape().dims();
        let strides = view.shape().strides();
        let rank = dims.len();
        let FormatOptions {
            max_items,
            column_major,
        } = self.options;

        if index > 0 {
            self.out.push(if sub_rank == 1 && column_major { ';' } else { ',' });
            for _ in 0..sub_rank {
                self.out.push('\n');
            }
            let indent = if sub_rank == 0 { 2 } else { rank - sub_rank };
            self.out.extend(std::iter::repeat(' ').take(indent));

            if dims[axis] > max_items && index == (max_items + 1) / 2 {
                if column_major && sub_rank == 1 {
                    self.out.push(' ');
                }
                self.out.push_str("...");
                return dims[axis] - max_items / 2;
            }
        }

        if sub_rank == 0 {
            self.out.push_str(&view.sob().read(pos as usize).to_string());
            return index + 1;
        }

        // the matrix level swaps its two axes in column-major mode
        let axis1 = if rank >= 2 && sub_rank <= 2 && column_major {
            2 - sub_rank
        } else {
            sub_rank - 1
        };
        let bracketed = (!column_major || rank < 2 || sub_rank != 1) && rank > 0;
        if bracketed {
            self.out.push('[');
        }
        if sub_rank == 1 {
            self.out.push(' ');
        }
        let mut index1 = 0;
        while index1 < dims[axis1] {
            let child = pos + index1 as isize * strides[axis1];
            index1 = self.print(child, sub_rank - 1, axis1, index1);
        }
        if bracketed {
            if sub_rank == 1 || (column_major && sub_rank == 2) {
                self.out.push(' ');
            }
            self.out.push(']');
        }
        index + 1
    }
}

impl<T: Scalar> TensorView<T> {
    /// Render the addressed elements as text.
    ///
    /// # Example
    ///
    /// ```
    /// use tensorview::{FormatOptions, TensorView};
    ///
    /// let t = TensorView::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// assert_eq!(t.as_string(&FormatOptions::default()), "[ 1,  3,  5;\n  2,  4,  6 ]");
    /// ```
    pub fn as_string(&self, options: &FormatOptions) -> String {
        let rank = self.rank();
        let mut printer = Printer {
            view: self,
            options: *options,
            out: String::with_capacity(self.shape().num_elements() * 5),
        };
        printer.print(self.shape().offset() as isize, rank, rank, 0);
        printer.out
    }
}

impl<T: Scalar> fmt::Display for TensorView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string(&FormatOptions::default()))
    }
}
