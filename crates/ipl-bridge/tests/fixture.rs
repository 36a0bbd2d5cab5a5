//! A hand-written WAT guest exercising the end-to-end scenarios of spec §8
//! (minus the `blake2b` business-logic scenario, which is guest-side
//! business logic out of scope for this bridge).
//!
//! The guest owns a trivial bump allocator (`alloc` never reclaims; `free`
//! is a no-op) — real allocator behaviour is an external collaborator per
//! the component boundary, so the fixture's job is only to produce
//! well-formed IPL halves, not to manage memory efficiently.

pub const GUEST_WAT: &str = r#"
(module
  (import "js" "log" (func $js_log (param i64 i64)))
  (import "js" "call" (func $js_call (param i64 i64 i64 i64) (result i64 i64)))

  (memory (export "memory") 2)

  ;; "Hello" at 0, "World" at 8, JSON text at 16
  (data (i32.const 0) "Hello")
  (data (i32.const 8) "World")
  (data (i32.const 16) "{\"message\":\"Greetings\"}")

  (global $bump (mut i32) (i32.const 256))

  (func $alloc (export "alloc") (param $len i32) (result i32)
    (local $p i32)
    (local.set $p (global.get $bump))
    (global.set $bump (i32.add (global.get $bump) (local.get $len)))
    (local.get $p))

  (func (export "free") (param $ptr i32) (param $len i32))

  ;; greet(name: string) -> string, "Hello " ++ name ++ "!"
  (func (export "greet") (param $lo i64) (param $hi i64) (result i64 i64)
    (local $arg_ptr i32)
    (local $arg_len i32)
    (local $out_ptr i32)
    (local $out_len i32)
    (local $i i32)

    (local.set $arg_ptr (i32.wrap_i64 (i64.and (i64.shr_u (local.get $lo) (i64.const 4)) (i64.const 0xFFFFFFFF))))
    (local.set $arg_len (i32.wrap_i64 (i64.and (i64.shr_u (local.get $lo) (i64.const 36)) (i64.const 0xFFFFFFF))))
    (local.set $out_len (i32.add (i32.add (local.get $arg_len) (i32.const 6)) (i32.const 1)))
    (local.set $out_ptr (call $alloc (local.get $out_len)))

    (i32.store8 (i32.add (local.get $out_ptr) (i32.const 0)) (i32.const 72))
    (i32.store8 (i32.add (local.get $out_ptr) (i32.const 1)) (i32.const 101))
    (i32.store8 (i32.add (local.get $out_ptr) (i32.const 2)) (i32.const 108))
    (i32.store8 (i32.add (local.get $out_ptr) (i32.const 3)) (i32.const 108))
    (i32.store8 (i32.add (local.get $out_ptr) (i32.const 4)) (i32.const 111))
    (i32.store8 (i32.add (local.get $out_ptr) (i32.const 5)) (i32.const 32))

    (local.set $i (i32.const 0))
    (block $break
      (loop $loop
        (br_if $break (i32.ge_u (local.get $i) (local.get $arg_len)))
        (i32.store8
          (i32.add (i32.add (local.get $out_ptr) (i32.const 6)) (local.get $i))
          (i32.load8_u (i32.add (local.get $arg_ptr) (local.get $i))))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $loop)))

    (i32.store8
      (i32.add (i32.add (local.get $out_ptr) (i32.const 6)) (local.get $arg_len))
      (i32.const 33))

    (i64.or
      (i64.or
        (i64.shl (i64.extend_i32_u (local.get $out_ptr)) (i64.const 4))
        (i64.shl (i64.extend_i32_u (local.get $out_len)) (i64.const 36)))
      (i64.const 6))
    (i64.const 0))

  ;; testFloat() -> 1.2345
  (func (export "testFloat") (result i64 i64)
    (i64.const 0xff3c083126e978d4)
    (i64.const 3))

  ;; testJSON() -> {"message":"Greetings"}
  (func (export "testJSON") (result i64 i64)
    (i64.or
      (i64.or
        (i64.shl (i64.const 16) (i64.const 4))
        (i64.shl (i64.const 23) (i64.const 36)))
      (i64.const 7))
    (i64.const 0))

  ;; testFunction(fn) calls fn("Hello", "World") via the js.call import
  (func (export "testFunction") (param $fn_lo i64) (param $fn_hi i64) (result i64 i64)
    (local $arr_ptr i32)
    (local $elem0_low i64)
    (local $elem1_low i64)

    (local.set $arr_ptr (call $alloc (i32.const 32)))
    (local.set $elem0_low
      (i64.or (i64.or (i64.shl (i64.const 0) (i64.const 4)) (i64.shl (i64.const 5) (i64.const 36))) (i64.const 6)))
    (local.set $elem1_low
      (i64.or (i64.or (i64.shl (i64.const 8) (i64.const 4)) (i64.shl (i64.const 5) (i64.const 36))) (i64.const 6)))

    (i64.store (i32.add (local.get $arr_ptr) (i32.const 0)) (local.get $elem0_low))
    (i64.store (i32.add (local.get $arr_ptr) (i32.const 8)) (i64.const 0))
    (i64.store (i32.add (local.get $arr_ptr) (i32.const 16)) (local.get $elem1_low))
    (i64.store (i32.add (local.get $arr_ptr) (i32.const 24)) (i64.const 0))

    (call $js_call
      (local.get $fn_lo) (local.get $fn_hi)
      (i64.or (i64.or (i64.shl (i64.extend_i32_u (local.get $arr_ptr)) (i64.const 4)) (i64.shl (i64.const 2) (i64.const 36))) (i64.const 9))
      (i64.const 0)))

  ;; testFunctionWithArgs(fn, args) forwards the already-encoded array
  ;; argument straight through to the js.call import.
  (func (export "testFunctionWithArgs")
        (param $fn_lo i64) (param $fn_hi i64) (param $args_lo i64) (param $args_hi i64)
        (result i64 i64)
    (call $js_call
      (local.get $fn_lo) (local.get $fn_hi)
      (local.get $args_lo) (local.get $args_hi))))
"#;
