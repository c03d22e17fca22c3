#![allow(bad_style)]

mod bmp;
