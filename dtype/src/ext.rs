use super::*;

/// Rust element types that can back a [`Storage`].
pub trait HasDType: Copy + Default + PartialOrd + Send + Sync + std::fmt::Debug + 'static {
    const DTYPE: DType;

    fn slice(storage: &Storage) -> Option<&[Self]>;

    fn slice_mut(storage: &mut Storage) -> Option<&mut [Self]>;

    fn wrap(values: Vec<Self>) -> Storage;
}

macro_rules! impl_dtype_ext {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl HasDType for $ty {
                const DTYPE: DType = DType::$variant;

                fn slice(storage: &Storage) -> Option<&[Self]> {
                    match storage {
                        Storage::$variant(values) => Some(values),
                        _ => None,
                    }
                }

                fn slice_mut(storage: &mut Storage) -> Option<&mut [Self]> {
                    match storage {
                        Storage::$variant(values) => Some(values),
                        _ => None,
                    }
                }

                fn wrap(values: Vec<Self>) -> Storage {
                    Storage::$variant(values)
                }
            }
        )*
    };
}

impl_dtype_ext! {
    i32 => Int32, u32 => UInt32, i64 => Int64,
    f32 => Float32, f64 => Float64,
}
