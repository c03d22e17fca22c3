//! Windows/OS-2 BMP: header classification, the pixel decode/encode
//! engines, and the [`BmpReader`]/[`BmpWriter`] handles built on top of them.

pub mod classify;
pub mod colormask;
pub mod colorspace;
pub(crate) mod decode;
pub(crate) mod encode;
pub mod file_header;
pub mod icc;
pub mod info_header;
pub mod numeric;
pub mod palette;
pub mod reader;
pub mod writer;

pub use classify::{BmpCompression, ClassifiedBmp, ClassifyOutcome};
pub use colormask::{BmpColorMask, ChannelMask};
pub use colorspace::{BmpColorspace, CieXyz, CieXyzTriple};
pub use file_header::BmpFileHeader;
pub use info_header::{BmpInfoHeader, InfoVersion};
pub use numeric::{Conv64Mode, ResultFormat, UndefinedPixelPolicy};
pub use palette::{BmpPalette, PaletteEntry};
pub use reader::{BmpReader, OpenOutcome, ReadState};
pub use writer::{BmpWriter, RleRequest, WriteState};
