use std::sync::Arc;

use tidyframe_error::{ErrorKind, FrameError, Result};

use crate::arrays::array::{Array, ArrayData};
use crate::arrays::bitmap::Bitmap;
use crate::arrays::selection::SelectionVector;

/// Build a new array containing the rows pointed to by `selection`, in
/// selection order.
///
/// Errors with `IndexOutOfRange` if any index is past the end of the array.
pub fn take(array: &Array, selection: &SelectionVector) -> Result<Array> {
    if let Some(bad) = selection.iter_locations().find(|&idx| idx >= array.len()) {
        return Err(
            FrameError::with_kind(ErrorKind::IndexOutOfRange, "Selection index out of range")
                .with_field("index", bad)
                .with_field("len", array.len()),
        );
    }

    let data = match &array.data {
        ArrayData::Boolean(v) => ArrayData::Boolean(take_values(v, selection)),
        ArrayData::Int64(v) => ArrayData::Int64(take_values(v, selection)),
        ArrayData::Float64(v) => ArrayData::Float64(take_values(v, selection)),
        ArrayData::Utf8(v) => ArrayData::Utf8(take_values(v, selection)),
        ArrayData::Any(v) => ArrayData::Any(take_values(v, selection)),
    };

    let validity = array.validity().map(|validity| {
        selection
            .iter_locations()
            .map(|idx| validity.value(idx))
            .collect::<Bitmap>()
    });

    Ok(Array::from_parts(data, validity))
}

fn take_values<T: Clone>(values: &[T], selection: &SelectionVector) -> Arc<[T]> {
    selection
        .iter_locations()
        .map(|idx| values[idx].clone())
        .collect()
}

/// Convert a boolean mask into the selection of rows to keep.
///
/// A row is kept only if the mask value is valid and true. Null and false both
/// exclude the row.
pub fn mask_to_selection(mask: &Array) -> Result<SelectionVector> {
    let ArrayData::Boolean(values) = &mask.data else {
        return Err(FrameError::type_mismatch("Filter mask must be boolean")
            .with_field("datatype", mask.datatype()));
    };

    let mut selection = SelectionVector::with_capacity(values.len());
    for (idx, &keep) in values.iter().enumerate() {
        if keep && mask.is_valid(idx) {
            selection.push_location(idx);
        }
    }

    Ok(selection)
}
