use ndarray::Array2;

/// Binary dilation by a `size`×`size` square.
///
/// For even sizes the square extends one pixel further towards the top-left.
/// Pixels outside the image are treated as false.
pub fn dilate_square(mask: &Array2<bool>, size: usize) -> Array2<bool> {
    if size == 0 {
        return Array2::from_elem(mask.dim(), false);
    }
    let before = (size / 2) as i32;
    let after = (size - 1 - size / 2) as i32;
    let inside = |d: i32| (-after..=before).contains(&d);
    dilate_with(mask, |dr, dc| inside(dr) && inside(dc), before.max(after))
}

/// Binary dilation by a disk of the given radius (`dr² + dc² <= radius²`).
pub fn dilate_disk(mask: &Array2<bool>, radius: usize) -> Array2<bool> {
    let r = radius as i32;
    dilate_with(mask, |dr, dc| dr * dr + dc * dc <= r * r, r)
}

/// A pixel becomes true if any pixel at offset `(dr, dc)` inside the
/// footprint is true. `reach` bounds the footprint's extent.
fn dilate_with<F>(mask: &Array2<bool>, footprint: F, reach: i32) -> Array2<bool>
where
    F: Fn(i32, i32) -> bool,
{
    let (h, w) = mask.dim();
    let mut result = Array2::from_elem((h, w), false);

    for row in 0..h {
        for col in 0..w {
            let mut any_true = false;
            'search: for dr in -reach..=reach {
                for dc in -reach..=reach {
                    if !footprint(dr, dc) {
                        continue;
                    }
                    let nr = row as i32 + dr;
                    let nc = col as i32 + dc;
                    if nr >= 0
                        && nr < h as i32
                        && nc >= 0
                        && nc < w as i32
                        && mask[[nr as usize, nc as usize]]
                    {
                        any_true = true;
                        break 'search;
                    }
                }
            }
            result[[row, col]] = any_true;
        }
    }

    result
}
